use std::sync::Arc;

use thiserror::Error;

use crate::{AuthorizeError, Identity, Token, TokenSlice};

/// What a successful (or partially successful) authorization relied on.
#[derive(Debug, Clone)]
pub struct AuthInfo<T: Token> {
    /// The authenticated caller, if any.
    pub identity: Option<Arc<dyn Identity>>,
    /// The token slices that contributed, in the order presented.
    pub tokens: Vec<TokenSlice<T>>,
    /// Conditions that could not be decided at check time, sorted and
    /// deduplicated. The caller must check these before acting.
    pub pending_conditions: Vec<String>,
}

impl<T: Token> Default for AuthInfo<T> {
    fn default() -> Self {
        Self {
            identity: None,
            tokens: Vec::new(),
            pending_conditions: Vec::new(),
        }
    }
}

impl<T: Token> AuthInfo<T> {
    /// The id of the authenticated caller, if any.
    pub fn identity_id(&self) -> Option<&str> {
        self.identity.as_deref().map(|identity| identity.id())
    }
}

/// Returned by [`crate::Authorizer::allow_any`] when not every operation
/// was allowed.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PartialAuthorization<T: Token> {
    /// Best effort information about what was used.
    pub info: AuthInfo<T>,
    /// One entry per requested operation.
    pub allowed: Vec<bool>,
    /// The error a full authorization would have returned.
    #[source]
    pub error: AuthorizeError<T>,
}
