//! Identity and ACL seams.
//!
//! The authorizer never decides group membership itself. It asks an
//! [`IdentityService`] who a login token declares, asks an [`AclSource`]
//! which ACLs govern the operations tokens did not cover, and asks the
//! resulting [`Identity`] whether it is a member.

use std::{error::Error, fmt, sync::Arc};

use async_trait::async_trait;
use dialog_caveat::{Caveat, Declared};
use thiserror::Error;

use crate::{Acl, KeyPair, Operation, PublicKey};

/// Errors raised while resolving or checking an identity.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// The declarations do not name a known identity.
    #[error("no identity declared: {0}")]
    NotDeclared(String),

    /// The identity backend failed.
    #[error("identity backend error: {0}")]
    Backend(#[source] Arc<dyn Error + Send + Sync>),
}

impl IdentityError {
    /// Wraps a backend failure.
    pub fn backend(error: impl Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(error))
    }
}

/// Errors raised by an [`AclSource`].
#[derive(Debug, Clone, Error)]
pub enum AclError {
    /// The ACL backend failed.
    #[error("acl backend error: {0}")]
    Backend(#[source] Arc<dyn Error + Send + Sync>),

    /// An operation has no ACL and cannot be decided.
    #[error("no acl for {0:?}")]
    Unknown(Operation),
}

impl AclError {
    /// Wraps a backend failure.
    pub fn backend(error: impl Error + Send + Sync + 'static) -> Self {
        Self::Backend(Arc::new(error))
    }
}

/// An authenticated caller.
#[async_trait]
pub trait Identity: fmt::Debug + Send + Sync {
    /// A unique id for the caller.
    fn id(&self) -> &str;

    /// The domain the id belongs to, empty by default.
    fn domain(&self) -> &str {
        ""
    }

    /// Whether the caller is a member of `acl`.
    async fn allow(&self, acl: &Acl) -> Result<bool, IdentityError>;
}

/// Issues identity caveats and turns declarations back into identities.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// The third party caveat a login token must carry. Discharging it
    /// proves who the caller is.
    fn identity_caveat(&self, service_key: &PublicKey) -> Caveat;

    /// The identity declared by a verified login token.
    async fn declared_identity(&self, declared: &Declared, key: &KeyPair) -> Result<Arc<dyn Identity>, IdentityError>;
}

/// The ACLs governing operations.
#[async_trait]
pub trait AclSource: Send + Sync {
    /// One ACL per operation, in the same order.
    async fn acls(&self, operations: &[Operation]) -> Result<Vec<Acl>, AclError>;
}
