//! Minting login challenges and capabilities.

use chrono::{DateTime, TimeDelta, Utc};
use dialog_caveat::{Caveat, CaveatSquasher};

use crate::{
    AuthorizeError, Checker, DischargeRequired, LOGIN_ENTITY, MintRequest, MultiOpEntity, Operation,
    Token, TokenId,
};

/// Entity a capability is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CapabilityScope {
    pub entity: String,
    /// Set when the scope is a single entity and the actions must be
    /// restricted with an `allow` caveat.
    pub allow: Option<Caveat>,
}

impl<T: Token> Checker<T> {
    /// Mints a token for `entity` under a fresh root key.
    pub(crate) async fn mint(&self, entity: &str, caveats: &[Caveat]) -> Result<T, AuthorizeError<T>> {
        let (root_key, storage_id) = self.root_keys.new_root_key().await?;
        let id = TokenId::new(entity, storage_id)?;
        let token = self.minter.mint(MintRequest {
            root_key: &root_key,
            id: &id,
            location: &self.location,
            caveats,
        })?;
        Ok(token)
    }

    /// A login token the caller must discharge with the identity service.
    pub(crate) async fn login_challenge(&self, now: DateTime<Utc>) -> Result<DischargeRequired<T>, AuthorizeError<T>> {
        let caveats = [
            self.identity_service.identity_caveat(self.key.public()),
            Caveat::time_before(expires_at(now, self.authentication_lifetime)?),
        ];
        let token = self.mint(LOGIN_ENTITY, &caveats).await?;
        tracing::debug!("minted login challenge");
        Ok(DischargeRequired {
            token,
            message: "login required".to_string(),
            authenticator: true,
        })
    }

    /// Picks the entity a capability for `operations` is scoped to.
    ///
    /// The login operation is never part of a capability. Operations on a
    /// single entity are scoped to that entity and restricted to their
    /// actions. Anything else is registered as a multi-op entity that
    /// expires at `expiry`, with the capability.
    pub(crate) async fn capability_scope(
        &self,
        operations: &[Operation],
        expiry: DateTime<Utc>,
    ) -> Result<CapabilityScope, AuthorizeError<T>> {
        let operations: Vec<Operation> = operations
            .iter()
            .filter(|op| !op.is_login())
            .cloned()
            .collect();
        let Some(first) = operations.first() else {
            return Err(AuthorizeError::NoCapabilityOperations);
        };

        if operations.iter().all(|op| op.entity == first.entity) {
            let actions = distinct_actions(&operations);
            return Ok(CapabilityScope {
                entity: first.entity.clone(),
                allow: Some(Caveat::allow(actions)),
            });
        }

        let (entity, operations) = MultiOpEntity::new(&operations).into_parts();
        self.multi_op_store
            .put(&entity, &operations, expiry)
            .await
            .inspect_err(|error| tracing::warn!(%entity, %error, "cannot save multi-op entity"))?;
        tracing::debug!(%entity, count = operations.len(), "saved multi-op entity");
        Ok(CapabilityScope {
            entity,
            allow: None,
        })
    }

    /// Mints a capability for `operations`.
    ///
    /// Third party caveats from `caveats` come first, then the squashed
    /// first party `conditions` together with the remaining `caveats` and a
    /// fresh expiry, then the scope's `allow` caveat.
    pub(crate) async fn mint_capability<I, S>(
        &self,
        operations: &[Operation],
        conditions: I,
        caveats: &[Caveat],
        now: DateTime<Utc>,
    ) -> Result<T, AuthorizeError<T>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let expiry = expires_at(now, self.capability_lifetime)?;
        let mut squasher = CaveatSquasher::new();
        squasher.extend(conditions);
        squasher.add(&Caveat::time_before(expiry).condition);

        let mut minted: Vec<Caveat> = Vec::with_capacity(caveats.len() + 2);
        for caveat in caveats {
            if caveat.is_third_party() {
                minted.push(caveat.clone());
            } else {
                squasher.add(&caveat.condition);
            }
        }
        minted.extend(squasher.finish().into_iter().map(Caveat::first_party));

        let scope = self.capability_scope(operations, expiry).await?;
        minted.extend(scope.allow);

        self.mint(&scope.entity, &minted).await
    }
}

/// `now` plus `lifetime`, or an error when that is past the representable
/// range.
pub(crate) fn expires_at<T: Token>(
    now: DateTime<Utc>,
    lifetime: TimeDelta,
) -> Result<DateTime<Utc>, AuthorizeError<T>> {
    now.checked_add_signed(lifetime)
        .ok_or(AuthorizeError::ExpiryOutOfRange)
}

/// The actions of `operations` without repeats, in first seen order.
pub(crate) fn distinct_actions(operations: &[Operation]) -> Vec<String> {
    let mut actions: Vec<String> = Vec::with_capacity(operations.len());
    for op in operations {
        if !actions.contains(&op.action) {
            actions.push(op.action.clone());
        }
    }
    actions
}
