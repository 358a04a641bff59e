//! Error types for the authorizer.
//!
//! [`AuthorizeError`] is what the authorizer returns. Its
//! [`AuthorizeError::DischargeRequired`] variant is not a failure in the
//! usual sense: it carries a freshly minted token the caller must get
//! discharged (or use to log in) before retrying, and request handlers are
//! expected to branch on it.
//!
//! [`ErrorCode`] and [`ServiceError`] give HTTP handlers a classification
//! that never exposes backend detail.

use dialog_caveat::Denial;
use serde::Serialize;
use thiserror::Error;

use crate::{
    AclError, IdentityError, MintError, Operation, OperationError, StoreError, Token, TokenIdError,
};

/// More proof is needed before the request can be authorized.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct DischargeRequired<T: Token> {
    /// The token to discharge, or to log in with.
    pub token: T,
    /// Why it is needed.
    pub message: String,
    /// True when the caller must authenticate, false when it must obtain
    /// discharges for additional caveats.
    pub authenticator: bool,
}

/// Errors returned by the authorizer.
#[derive(Debug, Error)]
pub enum AuthorizeError<T: Token> {
    /// No operations were requested.
    #[error("no operations requested")]
    NoOperations,

    /// A requested operation uses a reserved or malformed entity.
    #[error("invalid operation {operation:?}: {reason}")]
    InvalidOperation {
        /// The offending operation.
        operation: Operation,
        /// What is wrong with it.
        #[source]
        reason: OperationError,
    },

    /// A capability was requested for the login operation alone.
    #[error("no non-login operations required in capability")]
    NoCapabilityOperations,

    /// The caller is authenticated but not entitled.
    #[error("permission denied")]
    PermissionDenied,

    /// More proof is needed, see [`DischargeRequired`].
    #[error(transparent)]
    DischargeRequired(DischargeRequired<T>),

    /// A first party caveat attached to the request does not hold.
    #[error("caveat {condition:?} not satisfied: {reason}")]
    CaveatNotSatisfied {
        /// The condition.
        condition: String,
        /// Why it does not hold.
        reason: String,
    },

    /// A root key or multi-op lookup failed.
    #[error("cannot read token store: {0}")]
    Storage(#[from] StoreError),

    /// The ACL source failed.
    #[error("cannot retrieve ACLs: {0}")]
    Acl(#[from] AclError),

    /// Resolving or checking the identity failed.
    #[error("cannot check identity: {0}")]
    Identity(#[from] IdentityError),

    /// A new token could not be minted.
    #[error("cannot mint token: {0}")]
    Mint(#[from] MintError),

    /// A new token id could not be formed.
    #[error("cannot form token id: {0}")]
    TokenId(#[from] TokenIdError),

    /// A configured lifetime puts a token's expiry past the representable
    /// range.
    #[error("token expiry out of range")]
    ExpiryOutOfRange,

    /// The ACL source answered for the wrong number of operations.
    #[error("ACL source returned {got} ACLs for {want} operations")]
    AclCountMismatch {
        /// Number of operations asked about.
        want: usize,
        /// Number of ACLs returned.
        got: usize,
    },
}

impl<T: Token> From<DischargeRequired<T>> for AuthorizeError<T> {
    fn from(error: DischargeRequired<T>) -> Self {
        Self::DischargeRequired(error)
    }
}

impl<T: Token> From<Denial> for AuthorizeError<T> {
    fn from(denial: Denial) -> Self {
        Self::CaveatNotSatisfied {
            condition: denial.condition,
            reason: denial.reason,
        }
    }
}

impl<T: Token> AuthorizeError<T> {
    /// The discharge request, if this is one.
    pub fn discharge_required(&self) -> Option<&DischargeRequired<T>> {
        match self {
            Self::DischargeRequired(required) => Some(required),
            _ => None,
        }
    }

    /// Client facing classification.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::DischargeRequired(DischargeRequired {
                authenticator: true,
                ..
            }) => ErrorCode::AuthenticationRequired,
            Self::DischargeRequired(_) => ErrorCode::DischargeRequired,
            Self::PermissionDenied => ErrorCode::PermissionDenied,
            Self::CaveatNotSatisfied { .. } => ErrorCode::CaveatNotSatisfied,
            Self::NoOperations | Self::InvalidOperation { .. } | Self::NoCapabilityOperations => {
                ErrorCode::InvalidArgument
            }
            Self::Storage(_)
            | Self::Acl(_)
            | Self::Identity(_)
            | Self::Mint(_)
            | Self::TokenId(_)
            | Self::ExpiryOutOfRange
            | Self::AclCountMismatch { .. } => ErrorCode::InternalError,
        }
    }

    /// A message safe to show to untrusted callers.
    pub fn public_message(&self) -> String {
        match self.code() {
            ErrorCode::InternalError => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Error codes for authorization failures.
///
/// Each code maps to an HTTP status code via [`ErrorCode::status_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // 400 Bad Request
    /// The request itself is malformed
    InvalidArgument,

    // 401 Unauthorized
    /// The caller must log in
    AuthenticationRequired,
    /// The caller must discharge third party caveats
    DischargeRequired,

    // 403 Forbidden
    /// The caller is not entitled
    PermissionDenied,
    /// A caveat on the request does not hold
    CaveatNotSatisfied,

    // 500 Internal Server Error
    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidArgument => 400,
            ErrorCode::AuthenticationRequired | ErrorCode::DischargeRequired => 401,
            ErrorCode::PermissionDenied | ErrorCode::CaveatNotSatisfied => 403,
            ErrorCode::InternalError => 500,
        }
    }
}

/// Service error with code and message.
///
/// Framework specific code turns this into a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceError {
    /// The error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
}

impl ServiceError {
    /// Create a new service error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        self.code.status_code()
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ServiceError {}

impl<T: Token> From<&AuthorizeError<T>> for ServiceError {
    fn from(error: &AuthorizeError<T>) -> Self {
        if error.code() == ErrorCode::InternalError {
            tracing::warn!(%error, "authorization failed");
        }
        Self::new(error.code(), error.public_message())
    }
}

impl<T: Token> From<AuthorizeError<T>> for ServiceError {
    fn from(error: AuthorizeError<T>) -> Self {
        Self::from(&error)
    }
}

/// Errors building a [`crate::Checker`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// A required collaborator was not supplied.
    #[error("{0} is required")]
    Missing(&'static str),

    /// A lifetime does not fit a timestamp offset.
    #[error("{0} is out of range")]
    InvalidLifetime(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone)]
    struct Opaque;

    impl Token for Opaque {
        fn id(&self) -> &[u8] {
            b"opaque"
        }
    }

    fn discharge(authenticator: bool) -> AuthorizeError<Opaque> {
        DischargeRequired {
            token: Opaque,
            message: "login required".into(),
            authenticator,
        }
        .into()
    }

    #[test]
    fn it_maps_codes_to_status() {
        assert_eq!(discharge(true).code(), ErrorCode::AuthenticationRequired);
        assert_eq!(discharge(false).code(), ErrorCode::DischargeRequired);
        assert_eq!(discharge(true).code().status_code(), 401);
        assert_eq!(
            AuthorizeError::<Opaque>::PermissionDenied.code().status_code(),
            403
        );
        assert_eq!(
            AuthorizeError::<Opaque>::NoOperations.code().status_code(),
            400
        );
    }

    #[test]
    fn it_hides_backend_detail() {
        let error = AuthorizeError::<Opaque>::Storage(StoreError::backend(std::io::Error::other(
            "disk on fire at /var/lib/keys",
        )));
        assert!(error.to_string().contains("disk on fire"));

        let service = ServiceError::from(error);
        assert_eq!(service.status_code(), 500);
        assert_eq!(service.message, "internal error");
    }

    #[test]
    fn it_serializes_codes_in_screaming_snake_case() -> Result<(), serde_json::Error> {
        assert_eq!(
            serde_json::to_string(&ErrorCode::AuthenticationRequired)?,
            "\"AUTHENTICATION_REQUIRED\""
        );
        Ok(())
    }

    #[test]
    fn it_converts_denials() {
        let error: AuthorizeError<Opaque> = Denial {
            condition: "error nope".into(),
            reason: "nope".into(),
        }
        .into();
        assert_eq!(error.code(), ErrorCode::CaveatNotSatisfied);
        assert_eq!(error.public_message(), r#"caveat "error nope" not satisfied: nope"#);
    }
}
