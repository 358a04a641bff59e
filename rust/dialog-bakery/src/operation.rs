use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::is_multi_op_entity;

/// Entity name reserved for authentication tokens.
pub const LOGIN_ENTITY: &str = "login";

/// Action of the login operation.
pub const LOGIN_ACTION: &str = "login";

/// Prefix of entity names that stand for a set of operations.
pub const MULTI_OP_ENTITY_PREFIX: &str = "multi";

/// ACL member that makes an ACL public.
pub const EVERYONE: &str = "everyone";

/// An action on a named entity.
///
/// Ordering is by entity, then action.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Operation {
    /// The resource acted upon.
    pub entity: String,
    /// What is done to it.
    pub action: String,
}

impl Operation {
    /// An operation on `entity`.
    pub fn new(entity: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            action: action.into(),
        }
    }

    /// The operation that asks for an authenticated identity.
    pub fn login() -> Self {
        Self::new(LOGIN_ENTITY, LOGIN_ACTION)
    }

    /// True for [`Operation::login`].
    pub fn is_login(&self) -> bool {
        self.entity == LOGIN_ENTITY && self.action == LOGIN_ACTION
    }

    /// Checks that the entity is usable in a request.
    ///
    /// Entities must be non-empty, free of spaces, and must not use the
    /// reserved `login` or `multi-` prefixes. The login operation itself is
    /// the one exception.
    pub fn validate(&self) -> Result<(), OperationError> {
        if self.is_login() {
            return Ok(());
        }
        if self.entity.is_empty() {
            return Err(OperationError::Empty);
        }
        if self.entity.contains(' ') {
            return Err(OperationError::ContainsSpace(self.entity.clone()));
        }
        if self.entity.starts_with(LOGIN_ENTITY) {
            return Err(OperationError::ReservedLogin(self.entity.clone()));
        }
        if is_multi_op_entity(&self.entity) {
            return Err(OperationError::ReservedMultiOp(self.entity.clone()));
        }
        Ok(())
    }
}

/// Why a requested [`Operation`] cannot be authorized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    /// The entity name is empty.
    #[error("empty entity")]
    Empty,

    /// The entity name contains a space.
    #[error("entity {0:?} contains a space")]
    ContainsSpace(String),

    /// The entity name starts with the reserved `login` prefix.
    #[error("entity {0:?} uses the reserved login prefix")]
    ReservedLogin(String),

    /// The entity name is a multi-op entity name.
    #[error("entity {0:?} uses the reserved multi-op prefix")]
    ReservedMultiOp(String),
}

/// Users and groups allowed to perform an operation.
///
/// [`EVERYONE`] makes the ACL public. An empty ACL allows nobody.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acl(pub Vec<String>);

impl Acl {
    /// An ACL of the given members.
    pub fn new<I, S>(members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(members.into_iter().map(Into::into).collect())
    }

    /// The public ACL.
    pub fn everyone() -> Self {
        Self::new([EVERYONE])
    }

    /// True when the ACL lists [`EVERYONE`].
    pub fn is_public(&self) -> bool {
        self.0.iter().any(|member| member == EVERYONE)
    }

    /// True when `name` is listed.
    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|member| member == name)
    }

    /// The listed members.
    pub fn members(&self) -> &[String] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use testresult::TestResult;

    #[test]
    fn it_orders_by_entity_then_action() {
        let mut ops = vec![
            Operation::new("b", "read"),
            Operation::new("a", "write"),
            Operation::new("a", "read"),
        ];
        ops.sort();
        assert_eq!(
            ops,
            vec![
                Operation::new("a", "read"),
                Operation::new("a", "write"),
                Operation::new("b", "read"),
            ]
        );
    }

    #[test]
    fn it_rejects_reserved_entities() -> TestResult {
        Operation::login().validate()?;
        Operation::new("doc1", "read").validate()?;
        Operation::new("multiverse", "read").validate()?;

        assert_eq!(Operation::new("", "read").validate(), Err(OperationError::Empty));
        assert_eq!(
            Operation::new("doc 1", "read").validate(),
            Err(OperationError::ContainsSpace("doc 1".into()))
        );
        assert_eq!(
            Operation::new("login", "read").validate(),
            Err(OperationError::ReservedLogin("login".into()))
        );
        assert_eq!(
            Operation::new("loginx", "login").validate(),
            Err(OperationError::ReservedLogin("loginx".into()))
        );
        assert_eq!(
            Operation::new("multi-abc", "read").validate(),
            Err(OperationError::ReservedMultiOp("multi-abc".into()))
        );
        Ok(())
    }

    #[test]
    fn it_recognizes_public_acls() {
        assert!(Acl::everyone().is_public());
        assert!(Acl::new(["alice", "everyone"]).is_public());
        assert!(!Acl::new(["alice"]).is_public());
        assert!(!Acl::default().is_public());
    }

    #[test]
    fn it_serializes_acl_as_a_list() -> Result<(), serde_json::Error> {
        let acl = Acl::new(["alice", "bob"]);
        assert_eq!(serde_json::to_string(&acl)?, r#"["alice","bob"]"#);
        let op: Operation = serde_json::from_str(r#"{"entity":"doc1","action":"read"}"#)?;
        assert_eq!(op, Operation::new("doc1", "read"));
        Ok(())
    }
}
