use chrono::{DateTime, Utc};

use crate::Condition;

/// A caveat as it is attached to a token.
///
/// First party caveats are checked by the service itself. Third party
/// caveats name a `location` that must issue a discharge token before the
/// condition counts as satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Caveat {
    /// The condition text.
    pub condition: String,
    /// Where to obtain a discharge for this caveat, if it is third party.
    pub location: Option<String>,
}

impl Caveat {
    /// A caveat the service checks itself.
    pub fn first_party(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            location: None,
        }
    }

    /// A caveat discharged by the service at `location`.
    pub fn third_party(location: impl Into<String>, condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            location: Some(location.into()),
        }
    }

    /// `time-before <expiry>`
    pub fn time_before(expiry: DateTime<Utc>) -> Self {
        Self::first_party(Condition::TimeBefore(expiry).to_string())
    }

    /// `allow <action>...`
    pub fn allow<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::first_party(Condition::Allow(actions.into_iter().map(Into::into).collect()).to_string())
    }

    /// `deny <action>...`
    pub fn deny<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::first_party(Condition::Deny(actions.into_iter().map(Into::into).collect()).to_string())
    }

    /// `declared <key> <value>`
    pub fn declared(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::first_party(
            Condition::Declared {
                key: key.into(),
                value: value.into(),
            }
            .to_string(),
        )
    }

    /// `error <message>`, a caveat that can never be satisfied.
    pub fn error(message: impl Into<String>) -> Self {
        Self::first_party(Condition::Error(message.into()).to_string())
    }

    /// True when the caveat has a non-empty location.
    pub fn is_third_party(&self) -> bool {
        self.location
            .as_deref()
            .is_some_and(|location| !location.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn it_builds_standard_caveats() {
        assert_eq!(Caveat::allow(["read", "write"]).condition, "allow read write");
        assert_eq!(Caveat::deny(["delete"]).condition, "deny delete");
        assert_eq!(
            Caveat::declared("username", "bob").condition,
            "declared username bob"
        );
        assert_eq!(Caveat::error("no").condition, "error no");
    }

    #[test]
    fn it_treats_empty_location_as_first_party() {
        assert!(!Caveat::first_party("is-admin").is_third_party());
        assert!(!Caveat::third_party("", "is-admin").is_third_party());
        assert!(Caveat::third_party("https://idm.example", "is-admin").is_third_party());
    }
}
