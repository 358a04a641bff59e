use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use dialog_bakery::{Acl, Identity, IdentityError, IdentityService, KeyPair, PublicKey};
use dialog_caveat::{Caveat, Declared};

/// Condition of the third party caveat on login tokens.
pub const IS_AUTHENTICATED_USER: &str = "is-authenticated-user";

/// Declared attribute naming the user.
pub const USERNAME: &str = "username";

/// A user and the groups they belong to. Public ACLs allow every user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestIdentity {
    /// The username.
    pub id: String,
    /// Groups the user is a member of.
    pub groups: Vec<String>,
}

#[async_trait]
impl Identity for TestIdentity {
    fn id(&self) -> &str {
        &self.id
    }

    async fn allow(&self, acl: &Acl) -> Result<bool, IdentityError> {
        Ok(acl.is_public()
            || acl.contains(&self.id)
            || self.groups.iter().any(|group| acl.contains(group)))
    }
}

/// An identity service whose login tokens are discharged at `location` with
/// a `declared username <name>` caveat.
#[derive(Debug, Clone)]
pub struct TestIdentityService {
    location: String,
    groups: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl TestIdentityService {
    /// A service discharging at `location`.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            groups: Arc::default(),
        }
    }

    /// Where login tokens are discharged.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Puts `user` in `groups`.
    pub fn set_groups<I, S>(&self, user: impl Into<String>, groups: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Ok(mut known) = self.groups.write() {
            known.insert(user.into(), groups.into_iter().map(Into::into).collect());
        }
    }

    /// The caveat a discharge for `user` carries.
    pub fn declare(user: impl Into<String>) -> Caveat {
        Caveat::declared(USERNAME, user)
    }
}

#[async_trait]
impl IdentityService for TestIdentityService {
    fn identity_caveat(&self, _service_key: &PublicKey) -> Caveat {
        Caveat::third_party(self.location.clone(), IS_AUTHENTICATED_USER)
    }

    async fn declared_identity(&self, declared: &Declared, _key: &KeyPair) -> Result<Arc<dyn Identity>, IdentityError> {
        let user = declared
            .get(USERNAME)
            .ok_or_else(|| IdentityError::NotDeclared(format!("no {USERNAME} declared")))?;
        let groups = self
            .groups
            .read()
            .map(|known| known.get(user).cloned().unwrap_or_default())
            .unwrap_or_default();
        Ok(Arc::new(TestIdentity {
            id: user.to_string(),
            groups,
        }))
    }
}
