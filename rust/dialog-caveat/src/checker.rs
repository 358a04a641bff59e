use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{Condition, Declared, format_time};

/// What a condition is being checked against.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    /// The instant of the check.
    pub now: DateTime<Utc>,
    /// The actions the request wants to perform.
    pub actions: &'a [String],
    /// Attributes declared by the token being checked.
    pub declared: &'a Declared,
}

/// Outcome of checking a single condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The condition holds.
    Satisfied,
    /// The condition does not hold, with a reason.
    Denied(String),
    /// The checker cannot decide yet. The condition is carried forward as
    /// pending and must be checked again later.
    Unknown,
}

/// A service specific checker for conditions this crate does not know.
pub trait CaveatChecker: Send + Sync {
    /// Checks `condition` in `context`.
    fn check(&self, condition: &Condition, context: &CheckContext<'_>) -> Verdict;
}

/// A condition of a token that did not hold.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("caveat {condition:?} not satisfied: {reason}")]
pub struct Denial {
    /// The condition text as it appears on the token.
    pub condition: String,
    /// Why it did not hold.
    pub reason: String,
}

/// A token whose first party conditions all held or were deferred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checked {
    /// Attributes the token declares.
    pub declared: Declared,
    /// Conditions the checker could not decide, in token order.
    pub pending: Vec<String>,
}

/// Evaluates first party conditions.
///
/// The standard conditions are handled here. Everything else is passed to
/// the optional service checker and denied when there is none.
#[derive(Clone, Default)]
pub struct FirstPartyChecker {
    custom: Option<Arc<dyn CaveatChecker>>,
}

impl fmt::Debug for FirstPartyChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirstPartyChecker")
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl FirstPartyChecker {
    /// A checker that knows only the standard conditions.
    pub fn new() -> Self {
        Self::default()
    }

    /// A checker that falls back to `custom` for unrecognized conditions.
    pub fn with_checker(custom: Arc<dyn CaveatChecker>) -> Self {
        Self {
            custom: Some(custom),
        }
    }

    /// Parses and checks a single condition string.
    pub fn check_condition(&self, condition: &str, context: &CheckContext<'_>) -> Verdict {
        match Condition::parse(condition) {
            Ok(parsed) => self.check(&parsed, context),
            Err(error) => Verdict::Denied(error.to_string()),
        }
    }

    /// Checks every condition of one token against `actions`.
    ///
    /// Declarations are inferred from the same list first, so `declared`
    /// conditions are checked against what the token itself declares.
    pub fn check_all<S: AsRef<str>>(
        &self,
        conditions: &[S],
        actions: &[String],
        now: DateTime<Utc>,
    ) -> Result<Checked, Denial> {
        let declared = Declared::infer(conditions.iter().map(AsRef::as_ref));
        let context = CheckContext {
            now,
            actions,
            declared: &declared,
        };

        let mut pending = Vec::new();
        for condition in conditions {
            let condition = condition.as_ref();
            match self.check_condition(condition, &context) {
                Verdict::Satisfied => {}
                Verdict::Unknown => pending.push(condition.to_string()),
                Verdict::Denied(reason) => {
                    tracing::debug!(condition, %reason, "caveat denied");
                    return Err(Denial {
                        condition: condition.to_string(),
                        reason,
                    });
                }
            }
        }

        Ok(Checked { declared, pending })
    }
}

impl CaveatChecker for FirstPartyChecker {
    fn check(&self, condition: &Condition, context: &CheckContext<'_>) -> Verdict {
        match condition {
            Condition::TimeBefore(expiry) => {
                if context.now < *expiry {
                    Verdict::Satisfied
                } else {
                    Verdict::Denied(format!("token expired at {}", format_time(expiry)))
                }
            }
            Condition::Allow(listed) => {
                if context.actions.is_empty() {
                    return Verdict::Denied("no actions to allow".to_string());
                }
                match context.actions.iter().find(|action| !listed.contains(action)) {
                    None => Verdict::Satisfied,
                    Some(action) => Verdict::Denied(format!("{action} not allowed")),
                }
            }
            Condition::Deny(listed) => {
                match context.actions.iter().find(|action| listed.contains(action)) {
                    None => Verdict::Satisfied,
                    Some(action) => Verdict::Denied(format!("{action} not allowed")),
                }
            }
            Condition::Declared { key, value } => match context.declared.get(key) {
                Some(declared) if declared == value => Verdict::Satisfied,
                Some(declared) => {
                    Verdict::Denied(format!("got {key}={declared:?}, expected {value:?}"))
                }
                None => Verdict::Denied(format!("got {key}=null, expected {value:?}")),
            },
            Condition::Error(message) => Verdict::Denied(message.clone()),
            Condition::Unrecognized { .. } => match &self.custom {
                Some(custom) => custom.check(condition, context),
                None => Verdict::Denied("caveat not recognized".to_string()),
            },
        }
    }
}
