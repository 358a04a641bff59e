use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use dialog_bakery::{
    Checker, CheckerBuilder, ConfigurationError, IdentityService, KeyPair, LOGIN_ENTITY,
    MemoryMultiOpStore, MemoryRootKeyStore, MintError, MintRequest, PublicKey, RootKeyStore,
    StoreError, TokenId, TokenIdError, TokenMinter, TokenSlice,
};
use dialog_caveat::Caveat;
use thiserror::Error;

use crate::{HmacBakery, StaticAcls, TestIdentityService, TestToken};

/// Location of the service under test.
pub const SERVICE_LOCATION: &str = "https://service.example";

/// Location of the identity service discharging login tokens.
pub const IDENTITY_LOCATION: &str = "https://identity.example";

/// Errors minting fixture tokens.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The root key store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The entity cannot be used in a token id.
    #[error(transparent)]
    TokenId(#[from] TokenIdError),
    /// The bakery refused to mint.
    #[error(transparent)]
    Mint(#[from] MintError),
    /// The token has nothing to discharge at the given location.
    #[error("no third party caveat for {0}")]
    NothingToDischarge(String),
}

/// A service wired entirely with in-memory doubles.
#[derive(Debug, Clone)]
pub struct Fixture {
    /// Verifies and mints tokens.
    pub bakery: HmacBakery,
    /// Root keys of every token minted.
    pub root_keys: MemoryRootKeyStore,
    /// Operation sets behind multi-op entities.
    pub multi_ops: MemoryMultiOpStore,
    /// Who is logged in.
    pub identities: TestIdentityService,
    /// ACLs per operation.
    pub acls: StaticAcls,
    /// The service key.
    pub key: KeyPair,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    /// A fixture with empty stores and no ACLs.
    pub fn new() -> Self {
        Self {
            bakery: HmacBakery::new(),
            root_keys: MemoryRootKeyStore::new(),
            multi_ops: MemoryMultiOpStore::new(),
            identities: TestIdentityService::new(IDENTITY_LOCATION),
            acls: StaticAcls::new(),
            key: KeyPair::new(PublicKey::new(b"service-public".to_vec()), b"service-private".to_vec()),
        }
    }

    /// A checker builder wired to the fixture's doubles.
    pub fn builder(&self) -> CheckerBuilder<TestToken> {
        Checker::builder()
            .verifier(Arc::new(self.bakery.clone()))
            .minter(Arc::new(self.bakery.clone()))
            .root_keys(Arc::new(self.root_keys.clone()))
            .multi_op_store(Arc::new(self.multi_ops.clone()))
            .identity_service(Arc::new(self.identities.clone()))
            .acls(Arc::new(self.acls.clone()))
            .key(self.key.clone())
            .location(SERVICE_LOCATION)
    }

    /// A checker with default settings.
    pub fn checker(&self) -> Result<Checker<TestToken>, ConfigurationError> {
        self.builder().build()
    }

    /// Mints a token for `entity` under a fresh root key, as the service
    /// would.
    pub async fn mint(&self, entity: &str, caveats: &[Caveat]) -> Result<TestToken, FixtureError> {
        let (root_key, storage_id) = self.root_keys.new_root_key().await?;
        let id = TokenId::new(entity, storage_id)?;
        let token = self.bakery.mint(MintRequest {
            root_key: &root_key,
            id: &id,
            location: SERVICE_LOCATION,
            caveats,
        })?;
        Ok(token)
    }

    /// A capability for `actions` on `entity`, valid for an hour.
    pub async fn capability(&self, entity: &str, actions: &[&str]) -> Result<TestToken, FixtureError> {
        self.mint(
            entity,
            &[
                Caveat::time_before(Utc::now() + TimeDelta::hours(1)),
                Caveat::allow(actions.iter().copied()),
            ],
        )
        .await
    }

    /// A discharged login token for `user`.
    pub async fn login(&self, user: &str) -> Result<TokenSlice<TestToken>, FixtureError> {
        let token = self
            .mint(
                LOGIN_ENTITY,
                &[
                    self.identities.identity_caveat(self.key.public()),
                    Caveat::time_before(Utc::now() + TimeDelta::days(1)),
                ],
            )
            .await?;
        self.discharge_login(token, user)
    }

    /// Discharges the identity caveat of a login token for `user`.
    pub fn discharge_login(&self, token: TestToken, user: &str) -> Result<TokenSlice<TestToken>, FixtureError> {
        let discharge = token
            .discharge(IDENTITY_LOCATION, &[TestIdentityService::declare(user)])
            .ok_or_else(|| FixtureError::NothingToDischarge(IDENTITY_LOCATION.to_string()))?;
        Ok(TokenSlice::new(token, vec![discharge]))
    }
}
