use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::{ALLOW, DECLARED, DENY, TIME_BEFORE, format_time, parse_time, split};

/// Reduces a set of first party conditions to an equivalent minimal set.
///
/// Used when a capability is minted from the tokens that authorized a
/// request:
///
/// - duplicates collapse,
/// - of several `time-before` conditions only the earliest survives,
/// - `allow`, `deny` and `declared` are dropped since the minted token
///   carries its own operation scope,
/// - anything it cannot read is kept verbatim.
///
/// The result is sorted so the same input set always yields the same list.
#[derive(Debug, Clone, Default)]
pub struct CaveatSquasher {
    expiry: Option<DateTime<Utc>>,
    conditions: BTreeSet<String>,
}

impl CaveatSquasher {
    /// An empty squasher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one condition.
    pub fn add(&mut self, condition: &str) {
        let Ok((name, arg)) = split(condition) else {
            self.conditions.insert(condition.to_string());
            return;
        };
        match name {
            TIME_BEFORE => match parse_time(arg) {
                Ok(expiry) => {
                    self.expiry = Some(match self.expiry {
                        Some(current) => current.min(expiry),
                        None => expiry,
                    });
                }
                Err(_) => {
                    self.conditions.insert(condition.to_string());
                }
            },
            ALLOW | DENY | DECLARED => {}
            _ => {
                self.conditions.insert(condition.to_string());
            }
        }
    }

    /// Adds every condition in `conditions`.
    pub fn extend<I, S>(&mut self, conditions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for condition in conditions {
            self.add(condition.as_ref());
        }
    }

    /// The earliest expiry seen so far.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expiry
    }

    /// The squashed conditions in sorted order.
    pub fn finish(mut self) -> Vec<String> {
        if let Some(expiry) = self.expiry {
            self.conditions
                .insert(format!("{TIME_BEFORE} {}", format_time(&expiry)));
        }
        self.conditions.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn squash(conditions: &[&str]) -> Vec<String> {
        let mut squasher = CaveatSquasher::new();
        squasher.extend(conditions);
        squasher.finish()
    }

    #[test]
    fn it_is_empty_without_input() {
        assert!(squash(&[]).is_empty());
    }

    #[test]
    fn it_keeps_the_earliest_expiry() {
        assert_eq!(
            squash(&[
                "time-before 2030-01-01T00:00:00Z",
                "time-before 2029-06-01T00:00:00Z",
                "time-before 2031-01-01T00:00:00Z",
            ]),
            vec!["time-before 2029-06-01T00:00:00Z".to_string()]
        );
    }

    #[test]
    fn it_drops_scope_conditions() {
        assert_eq!(
            squash(&[
                "allow read",
                "deny write",
                "declared username bob",
                "is-admin",
                "is-admin",
            ]),
            vec!["is-admin".to_string()]
        );
    }

    #[test]
    fn it_keeps_what_it_cannot_read() {
        assert_eq!(
            squash(&["time-before whenever", " leading", "zz", ""]),
            vec![
                "".to_string(),
                " leading".to_string(),
                "time-before whenever".to_string(),
                "zz".to_string(),
            ]
        );
    }
}
