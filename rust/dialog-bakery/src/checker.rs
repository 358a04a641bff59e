use std::{fmt, sync::Arc, time::Duration};

use chrono::{TimeDelta, Utc};
use dialog_caveat::{Caveat, CaveatChecker, FirstPartyChecker};

use crate::{
    AclSource, AuthInfo, AuthorizeError, Authorizer, ConfigurationError, IdentityService, KeyPair,
    MultiOpStore, Operation, RootKeyStore, Token, TokenMinter, TokenSlice, TokenVerifier,
};

/// How long minted capabilities stay valid unless configured otherwise.
pub const DEFAULT_CAPABILITY_LIFETIME: Duration = Duration::from_secs(5 * 60);

/// How long minted login tokens stay valid unless configured otherwise.
pub const DEFAULT_AUTHENTICATION_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Authorizes operations against presented tokens.
///
/// A `Checker` holds the service configuration and its collaborators and is
/// shared across requests. Each request gets its own [`Authorizer`].
pub struct Checker<T: Token> {
    pub(crate) verifier: Arc<dyn TokenVerifier<T>>,
    pub(crate) minter: Arc<dyn TokenMinter<T>>,
    pub(crate) root_keys: Arc<dyn RootKeyStore>,
    pub(crate) multi_op_store: Arc<dyn MultiOpStore>,
    pub(crate) identity_service: Arc<dyn IdentityService>,
    pub(crate) acls: Arc<dyn AclSource>,
    pub(crate) key: KeyPair,
    pub(crate) first_party: FirstPartyChecker,
    pub(crate) location: String,
    pub(crate) capability_lifetime: TimeDelta,
    pub(crate) authentication_lifetime: TimeDelta,
}

impl<T: Token> Clone for Checker<T> {
    fn clone(&self) -> Self {
        Self {
            verifier: self.verifier.clone(),
            minter: self.minter.clone(),
            root_keys: self.root_keys.clone(),
            multi_op_store: self.multi_op_store.clone(),
            identity_service: self.identity_service.clone(),
            acls: self.acls.clone(),
            key: self.key.clone(),
            first_party: self.first_party.clone(),
            location: self.location.clone(),
            capability_lifetime: self.capability_lifetime,
            authentication_lifetime: self.authentication_lifetime,
        }
    }
}

impl<T: Token> fmt::Debug for Checker<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checker")
            .field("key", &self.key)
            .field("location", &self.location)
            .field("capability_lifetime", &self.capability_lifetime)
            .field("authentication_lifetime", &self.authentication_lifetime)
            .finish_non_exhaustive()
    }
}

impl<T: Token> Checker<T> {
    /// Create a builder for a checker.
    pub fn builder() -> CheckerBuilder<T> {
        CheckerBuilder::default()
    }

    /// Starts authorizing a request that presented `tokens`.
    pub fn authorizer<I>(&self, tokens: I) -> Authorizer<'_, T>
    where
        I: IntoIterator<Item = TokenSlice<T>>,
    {
        Authorizer::new(self, tokens.into_iter().collect())
    }

    /// Authorizes `operations` in one go, see [`Authorizer::allow`].
    pub async fn authorize(
        &self,
        tokens: Vec<TokenSlice<T>>,
        operations: &[Operation],
        caveats: &[Caveat],
    ) -> Result<AuthInfo<T>, AuthorizeError<T>> {
        self.authorizer(tokens).allow(operations, caveats).await
    }

    /// Mints a capability in one go, see [`Authorizer::capability`].
    pub async fn capability(
        &self,
        tokens: Vec<TokenSlice<T>>,
        operations: &[Operation],
        caveats: &[Caveat],
    ) -> Result<(T, AuthInfo<T>), AuthorizeError<T>> {
        self.authorizer(tokens).capability(operations, caveats).await
    }

    /// The service key.
    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    /// The location minted tokens carry.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Lifetime of minted capabilities.
    pub fn capability_lifetime(&self) -> TimeDelta {
        self.capability_lifetime
    }

    /// Lifetime of minted login tokens.
    pub fn authentication_lifetime(&self) -> TimeDelta {
        self.authentication_lifetime
    }
}

/// Builder for [`Checker`].
///
/// # Required Fields
///
/// - `verifier`, `minter`: the token implementation
/// - `root_keys`, `multi_op_store`: where root keys and multi-op sets live
/// - `identity_service`, `acls`: who the caller is and what they may do
/// - `key`: the service key pair
pub struct CheckerBuilder<T: Token> {
    verifier: Option<Arc<dyn TokenVerifier<T>>>,
    minter: Option<Arc<dyn TokenMinter<T>>>,
    root_keys: Option<Arc<dyn RootKeyStore>>,
    multi_op_store: Option<Arc<dyn MultiOpStore>>,
    identity_service: Option<Arc<dyn IdentityService>>,
    acls: Option<Arc<dyn AclSource>>,
    key: Option<KeyPair>,
    caveat_checker: Option<Arc<dyn CaveatChecker>>,
    location: Option<String>,
    capability_lifetime: Option<Duration>,
    authentication_lifetime: Option<Duration>,
}

impl<T: Token> Default for CheckerBuilder<T> {
    fn default() -> Self {
        Self {
            verifier: None,
            minter: None,
            root_keys: None,
            multi_op_store: None,
            identity_service: None,
            acls: None,
            key: None,
            caveat_checker: None,
            location: None,
            capability_lifetime: None,
            authentication_lifetime: None,
        }
    }
}

impl<T: Token> CheckerBuilder<T> {
    /// Set the token verifier.
    pub fn verifier(mut self, verifier: Arc<dyn TokenVerifier<T>>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Set the token minter.
    pub fn minter(mut self, minter: Arc<dyn TokenMinter<T>>) -> Self {
        self.minter = Some(minter);
        self
    }

    /// Set the root key store.
    pub fn root_keys(mut self, root_keys: Arc<dyn RootKeyStore>) -> Self {
        self.root_keys = Some(root_keys);
        self
    }

    /// Set the store backing multi-op entities.
    pub fn multi_op_store(mut self, store: Arc<dyn MultiOpStore>) -> Self {
        self.multi_op_store = Some(store);
        self
    }

    /// Set the identity service.
    pub fn identity_service(mut self, service: Arc<dyn IdentityService>) -> Self {
        self.identity_service = Some(service);
        self
    }

    /// Set the ACL source consulted for operations no token covers.
    pub fn acls(mut self, acls: Arc<dyn AclSource>) -> Self {
        self.acls = Some(acls);
        self
    }

    /// Set the service key pair.
    pub fn key(mut self, key: KeyPair) -> Self {
        self.key = Some(key);
        self
    }

    /// Set a checker for conditions beyond the standard ones.
    ///
    /// Without one, unrecognized conditions are denied.
    pub fn caveat_checker(mut self, checker: Arc<dyn CaveatChecker>) -> Self {
        self.caveat_checker = Some(checker);
        self
    }

    /// Set the location minted tokens carry. Defaults to empty.
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set how long minted capabilities stay valid.
    pub fn capability_lifetime(mut self, lifetime: Duration) -> Self {
        self.capability_lifetime = Some(lifetime);
        self
    }

    /// Set how long minted login tokens stay valid.
    pub fn authentication_lifetime(mut self, lifetime: Duration) -> Self {
        self.authentication_lifetime = Some(lifetime);
        self
    }

    /// Build the checker.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or a lifetime would
    /// put expiries beyond the representable range.
    pub fn build(self) -> Result<Checker<T>, ConfigurationError> {
        let verifier = self
            .verifier
            .ok_or(ConfigurationError::Missing("verifier"))?;
        let minter = self.minter.ok_or(ConfigurationError::Missing("minter"))?;
        let root_keys = self
            .root_keys
            .ok_or(ConfigurationError::Missing("root_keys"))?;
        let multi_op_store = self
            .multi_op_store
            .ok_or(ConfigurationError::Missing("multi_op_store"))?;
        let identity_service = self
            .identity_service
            .ok_or(ConfigurationError::Missing("identity_service"))?;
        let acls = self.acls.ok_or(ConfigurationError::Missing("acls"))?;
        let key = self.key.ok_or(ConfigurationError::Missing("key"))?;

        let first_party = match self.caveat_checker {
            Some(checker) => FirstPartyChecker::with_checker(checker),
            None => FirstPartyChecker::new(),
        };

        Ok(Checker {
            verifier,
            minter,
            root_keys,
            multi_op_store,
            identity_service,
            acls,
            key,
            first_party,
            location: self.location.unwrap_or_default(),
            capability_lifetime: lifetime(
                "capability_lifetime",
                self.capability_lifetime,
                DEFAULT_CAPABILITY_LIFETIME,
            )?,
            authentication_lifetime: lifetime(
                "authentication_lifetime",
                self.authentication_lifetime,
                DEFAULT_AUTHENTICATION_LIFETIME,
            )?,
        })
    }
}

fn lifetime(
    name: &'static str,
    configured: Option<Duration>,
    default: Duration,
) -> Result<TimeDelta, ConfigurationError> {
    let lifetime = configured
        .filter(|lifetime| !lifetime.is_zero())
        .unwrap_or(default);
    TimeDelta::from_std(lifetime)
        .ok()
        .filter(|delta| Utc::now().checked_add_signed(*delta).is_some())
        .ok_or(ConfigurationError::InvalidLifetime(name))
}
