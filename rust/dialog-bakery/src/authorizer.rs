//! The per-request authorization session.

use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, Utc};
use dialog_caveat::{Caveat, CaveatSquasher};
use tokio::sync::OnceCell;

use crate::{
    AuthInfo, AuthorizeError, Checker, DischargeRequired, Identity, LOGIN_ENTITY, Operation,
    PartialAuthorization, StoreError, Token, TokenId, TokenSlice, is_multi_op_entity,
    mint::distinct_actions,
};

/// What a verified token is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    /// An authentication token.
    Login,
    /// Any action on one entity.
    Entity(String),
    /// The operations stored behind a multi-op entity.
    Operations(Vec<Operation>),
}

impl Scope {
    fn covers(&self, op: &Operation) -> bool {
        match self {
            Scope::Login => false,
            Scope::Entity(entity) => entity == &op.entity,
            Scope::Operations(operations) => operations.contains(op),
        }
    }
}

/// A presented token that verified against a known root key.
#[derive(Debug, Clone)]
struct Classified {
    scope: Scope,
    conditions: Vec<String>,
}

/// Progress of one authorization.
struct Decision {
    allowed: Vec<bool>,
    used: Vec<bool>,
    identity: Option<Arc<dyn Identity>>,
    pending: BTreeSet<String>,
}

/// Authorizes operations for a single request.
///
/// Created by [`Checker::authorizer`] with the tokens the request presented.
/// The tokens are classified once, on first use, and the result (including
/// a store failure) is shared by every call on the session. Concurrent calls
/// wait for that one classification.
pub struct Authorizer<'a, T: Token> {
    checker: &'a Checker<T>,
    tokens: Vec<TokenSlice<T>>,
    classified: OnceCell<Result<Vec<Option<Classified>>, StoreError>>,
}

impl<'a, T: Token> Authorizer<'a, T> {
    pub(crate) fn new(checker: &'a Checker<T>, tokens: Vec<TokenSlice<T>>) -> Self {
        Self {
            checker,
            tokens,
            classified: OnceCell::new(),
        }
    }

    /// The tokens presented to this session.
    pub fn tokens(&self) -> &[TokenSlice<T>] {
        &self.tokens
    }

    /// Checks that every one of `operations` is allowed.
    ///
    /// Operations are first matched against the presented capability
    /// tokens, then a login token is used to resolve the caller's identity,
    /// and whatever remains is checked against its ACL. `caveats` are extra
    /// conditions the request imposes when it is authorized through ACLs.
    ///
    /// # Errors
    ///
    /// - [`AuthorizeError::DischargeRequired`] when the caller must log in
    ///   or discharge third party caveats
    /// - [`AuthorizeError::PermissionDenied`] when an authenticated caller
    ///   is not entitled
    /// - [`AuthorizeError::Storage`] and friends when a collaborator fails
    pub async fn allow(&self, operations: &[Operation], caveats: &[Caveat]) -> Result<AuthInfo<T>, AuthorizeError<T>> {
        self.allow_any(operations, caveats)
            .await
            .map_err(|partial| partial.error)
    }

    /// Like [`Authorizer::allow`], but on failure reports which operations
    /// were allowed and what was used to allow them.
    pub async fn allow_any(
        &self,
        operations: &[Operation],
        caveats: &[Caveat],
    ) -> Result<AuthInfo<T>, PartialAuthorization<T>> {
        let (decision, outcome) = self.decide(operations, caveats, Utc::now()).await;
        let info = self.info(&decision);
        match outcome {
            Ok(()) => Ok(info),
            Err(error) => Err(PartialAuthorization {
                info,
                allowed: decision.allowed,
                error,
            }),
        }
    }

    /// Authorizes `operations` and returns the first party conditions a
    /// capability for them must carry: the squashed conditions of every
    /// token used, the pending conditions and the first party `caveats`.
    pub async fn allow_capability(
        &self,
        operations: &[Operation],
        caveats: &[Caveat],
    ) -> Result<Vec<String>, AuthorizeError<T>> {
        if operations.iter().all(Operation::is_login) {
            return Err(AuthorizeError::NoCapabilityOperations);
        }
        let (decision, outcome) = self.decide(operations, caveats, Utc::now()).await;
        outcome?;

        let mut squasher = CaveatSquasher::new();
        squasher.extend(self.carried_conditions(&decision).await?);
        for caveat in caveats.iter().filter(|caveat| !caveat.is_third_party()) {
            squasher.add(&caveat.condition);
        }
        Ok(squasher.finish())
    }

    /// Authorizes `operations` and mints a capability for them.
    ///
    /// The capability carries the conditions [`Authorizer::allow_capability`]
    /// would return, `caveats`, and an expiry of the configured capability
    /// lifetime. The login operation is never part of it.
    pub async fn capability(
        &self,
        operations: &[Operation],
        caveats: &[Caveat],
    ) -> Result<(T, AuthInfo<T>), AuthorizeError<T>> {
        if operations.iter().all(Operation::is_login) {
            return Err(AuthorizeError::NoCapabilityOperations);
        }
        let now = Utc::now();
        let (decision, outcome) = self.decide(operations, caveats, now).await;
        outcome?;

        let conditions = self.carried_conditions(&decision).await?;
        let token = self
            .checker
            .mint_capability(operations, conditions, caveats, now)
            .await?;
        Ok((token, self.info(&decision)))
    }

    async fn classified(&self) -> Result<&[Option<Classified>], AuthorizeError<T>> {
        let classified = self
            .classified
            .get_or_init(|| self.classify())
            .await;
        match classified {
            Ok(classified) => Ok(classified),
            Err(error) => Err(error.clone().into()),
        }
    }

    async fn classify(&self) -> Result<Vec<Option<Classified>>, StoreError> {
        let mut classified = Vec::with_capacity(self.tokens.len());
        for (index, slice) in self.tokens.iter().enumerate() {
            classified.push(self.classify_one(index, slice).await?);
        }
        Ok(classified)
    }

    /// Verifies one presented token. `Ok(None)` means the token is of no
    /// use; only store failures are errors.
    async fn classify_one(&self, index: usize, slice: &TokenSlice<T>) -> Result<Option<Classified>, StoreError> {
        let id = match TokenId::parse(slice.primary.id()) {
            Ok(id) => id,
            Err(error) => {
                tracing::debug!(token = index, %error, "cannot decode token id");
                return Ok(None);
            }
        };

        let root_key = self
            .checker
            .root_keys
            .get(id.storage_id())
            .await
            .inspect_err(|error| {
                tracing::warn!(token = index, entity = id.entity(), %error, "cannot get root key")
            })?;
        let Some(root_key) = root_key else {
            tracing::debug!(token = index, entity = id.entity(), "root key not found");
            return Ok(None);
        };

        let conditions = match self.checker.verifier.verify(slice, &root_key) {
            Ok(conditions) => conditions,
            Err(error) => {
                tracing::debug!(token = index, entity = id.entity(), %error, "token verification failed");
                return Ok(None);
            }
        };

        let scope = if id.entity() == LOGIN_ENTITY {
            Scope::Login
        } else if is_multi_op_entity(id.entity()) {
            match self.checker.multi_op_store.get(id.entity()).await {
                Ok(operations) => Scope::Operations(operations),
                Err(StoreError::NotFound) => {
                    tracing::debug!(token = index, entity = id.entity(), "multi-op entity not found");
                    return Ok(None);
                }
                Err(error) => {
                    tracing::warn!(token = index, entity = id.entity(), %error, "cannot get multi-op entity");
                    return Err(error);
                }
            }
        } else {
            Scope::Entity(id.entity().to_string())
        };

        Ok(Some(Classified { scope, conditions }))
    }

    async fn decide(
        &self,
        operations: &[Operation],
        caveats: &[Caveat],
        now: DateTime<Utc>,
    ) -> (Decision, Result<(), AuthorizeError<T>>) {
        let mut decision = Decision {
            allowed: vec![false; operations.len()],
            used: vec![false; self.tokens.len()],
            identity: None,
            pending: BTreeSet::new(),
        };
        let outcome = self.decide_into(&mut decision, operations, caveats, now).await;
        tracing::trace!(allowed = ?decision.allowed, ok = outcome.is_ok(), "authorization decided");
        (decision, outcome)
    }

    async fn decide_into(
        &self,
        decision: &mut Decision,
        operations: &[Operation],
        caveats: &[Caveat],
        now: DateTime<Utc>,
    ) -> Result<(), AuthorizeError<T>> {
        if operations.is_empty() {
            return Err(AuthorizeError::NoOperations);
        }
        for op in operations {
            op.validate()
                .map_err(|reason| AuthorizeError::InvalidOperation {
                    operation: op.clone(),
                    reason,
                })?;
        }

        let classified = self.classified().await?;
        self.check_capabilities(decision, classified, operations, now);
        self.check_login(decision, classified, operations, now).await;

        for (allowed, op) in decision.allowed.iter_mut().zip(operations) {
            if op.is_login() {
                *allowed = decision.identity.is_some();
            }
        }

        if decision.allowed.iter().all(|allowed| *allowed) {
            return Ok(());
        }

        let mut denied = operations
            .iter()
            .zip(&decision.allowed)
            .any(|(op, allowed)| op.is_login() && !allowed);

        let needed: Vec<usize> = operations
            .iter()
            .enumerate()
            .filter(|(index, op)| !decision.allowed[*index] && !op.is_login())
            .map(|(index, _)| index)
            .collect();

        if !needed.is_empty() {
            let needed_operations: Vec<Operation> =
                needed.iter().map(|index| operations[*index].clone()).collect();
            tracing::debug!(operations = ?needed_operations, "operations still needed after token checks");

            let acls = self.checker.acls.acls(&needed_operations).await?;
            if acls.len() != needed_operations.len() {
                return Err(AuthorizeError::AclCountMismatch {
                    want: needed_operations.len(),
                    got: acls.len(),
                });
            }

            for (index, acl) in needed.into_iter().zip(acls) {
                let allowed = match &decision.identity {
                    None => acl.is_public(),
                    Some(identity) => identity.allow(&acl).await?,
                };
                if allowed {
                    decision.allowed[index] = true;
                } else {
                    denied = true;
                }
            }
        }

        if denied {
            return match decision.identity {
                Some(_) => Err(AuthorizeError::PermissionDenied),
                None => Err(self.checker.login_challenge(now).await?.into()),
            };
        }

        if caveats.is_empty() {
            return Ok(());
        }

        if caveats.iter().any(Caveat::is_third_party) {
            let conditions = self.carried_conditions(decision).await?;
            let token = self
                .checker
                .mint_capability(operations, conditions, caveats, now)
                .await?;
            tracing::debug!("minted token for further authorization");
            return Err(DischargeRequired {
                token,
                message: "further authorization required".to_string(),
                authenticator: false,
            }
            .into());
        }

        let conditions: Vec<&str> = caveats
            .iter()
            .map(|caveat| caveat.condition.as_str())
            .collect();
        let checked = self
            .checker
            .first_party
            .check_all(&conditions, &distinct_actions(operations), now)?;
        decision.pending.extend(checked.pending);
        Ok(())
    }

    /// Marks the operations the presented capability tokens cover.
    fn check_capabilities(
        &self,
        decision: &mut Decision,
        classified: &[Option<Classified>],
        operations: &[Operation],
        now: DateTime<Utc>,
    ) {
        for (index, token) in classified.iter().enumerate() {
            let Some(token) = token else { continue };
            if token.scope == Scope::Login {
                continue;
            }
            for (position, op) in operations.iter().enumerate() {
                if decision.allowed[position] || op.is_login() || !token.scope.covers(op) {
                    continue;
                }
                match self.checker.first_party.check_all(
                    &token.conditions,
                    std::slice::from_ref(&op.action),
                    now,
                ) {
                    Ok(checked) => {
                        decision.allowed[position] = true;
                        decision.used[index] = true;
                        decision.pending.extend(checked.pending);
                    }
                    Err(denial) => {
                        tracing::debug!(token = index, entity = %op.entity, action = %op.action, %denial, "token does not allow operation")
                    }
                }
            }
        }
    }

    /// Resolves the caller's identity from the first usable login token.
    ///
    /// A login token is usable only if its conditions hold for every
    /// requested action.
    async fn check_login(
        &self,
        decision: &mut Decision,
        classified: &[Option<Classified>],
        operations: &[Operation],
        now: DateTime<Utc>,
    ) {
        let actions = distinct_actions(operations);
        for (index, token) in classified.iter().enumerate() {
            let Some(token) = token else { continue };
            if token.scope != Scope::Login {
                continue;
            }
            if decision.identity.is_some() {
                tracing::debug!(token = index, "ignoring additional login token");
                continue;
            }

            let checked = match self
                .checker
                .first_party
                .check_all(&token.conditions, &actions, now)
            {
                Ok(checked) => checked,
                Err(denial) => {
                    tracing::debug!(token = index, %denial, "login token not valid for request");
                    continue;
                }
            };

            match self
                .checker
                .identity_service
                .declared_identity(&checked.declared, &self.checker.key)
                .await
            {
                Ok(identity) => {
                    tracing::debug!(token = index, identity = identity.id(), "authenticated");
                    decision.identity = Some(identity);
                    decision.used[index] = true;
                    decision.pending.extend(checked.pending);
                }
                Err(error) => {
                    tracing::debug!(token = index, %error, "cannot decode identity");
                }
            }
        }
    }

    /// First party conditions of the used tokens followed by the pending
    /// conditions.
    async fn carried_conditions(&self, decision: &Decision) -> Result<Vec<String>, AuthorizeError<T>> {
        let classified = self.classified().await?;
        let mut conditions = Vec::new();
        for (token, used) in classified.iter().zip(&decision.used) {
            if let (Some(token), true) = (token, *used) {
                conditions.extend(token.conditions.iter().cloned());
            }
        }
        conditions.extend(decision.pending.iter().cloned());
        Ok(conditions)
    }

    fn info(&self, decision: &Decision) -> AuthInfo<T> {
        AuthInfo {
            identity: decision.identity.clone(),
            tokens: self
                .tokens
                .iter()
                .zip(&decision.used)
                .filter(|(_, used)| **used)
                .map(|(slice, _)| slice.clone())
                .collect(),
            pending_conditions: decision.pending.iter().cloned().collect(),
        }
    }
}
