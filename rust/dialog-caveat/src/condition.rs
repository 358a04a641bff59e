//! Typed reading of caveat condition strings.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::ConditionError;

/// Name of the condition that bounds a token's lifetime.
pub const TIME_BEFORE: &str = "time-before";

/// Name of the condition that restricts the permitted actions.
pub const ALLOW: &str = "allow";

/// Name of the condition that excludes actions.
pub const DENY: &str = "deny";

/// Name of the condition that declares an attribute (such as a username).
pub const DECLARED: &str = "declared";

/// Name of the condition that always fails.
pub const ERROR: &str = "error";

/// A caveat condition, parsed.
///
/// Conditions travel as strings inside tokens. This is the view the checker
/// and squasher branch on. Conditions this crate does not know are kept as
/// [`Condition::Unrecognized`] and render back to exactly the text they were
/// parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// `time-before <instant>`
    TimeBefore(DateTime<Utc>),
    /// `allow <action>...`
    Allow(Vec<String>),
    /// `deny <action>...`
    Deny(Vec<String>),
    /// `declared <key> <value>`
    Declared {
        /// The declared attribute.
        key: String,
        /// Its value. May contain spaces.
        value: String,
    },
    /// `error <message>`
    Error(String),
    /// Any other condition.
    Unrecognized {
        /// Everything before the first space.
        name: String,
        /// Everything after the first space, if there was one.
        arg: Option<String>,
    },
}

/// Splits a condition string into its name and argument at the first space.
///
/// A condition with no space has an empty argument.
pub fn split(condition: &str) -> Result<(&str, &str), ConditionError> {
    if condition.is_empty() {
        return Err(ConditionError::Empty);
    }
    match condition.find(' ') {
        None => Ok((condition, "")),
        Some(0) => Err(ConditionError::LeadingSpace),
        Some(index) => Ok((&condition[..index], &condition[index + 1..])),
    }
}

impl Condition {
    /// Parses a condition string.
    pub fn parse(condition: &str) -> Result<Self, ConditionError> {
        let (name, arg) = split(condition)?;
        let parsed = match name {
            TIME_BEFORE => Condition::TimeBefore(parse_time(arg)?),
            ALLOW => Condition::Allow(fields(arg)),
            DENY => Condition::Deny(fields(arg)),
            DECLARED => match arg.split_once(' ') {
                Some((key, value)) if !key.is_empty() => Condition::Declared {
                    key: key.to_string(),
                    value: value.to_string(),
                },
                _ => return Err(ConditionError::MalformedDeclared(arg.to_string())),
            },
            ERROR => Condition::Error(arg.to_string()),
            _ => Condition::Unrecognized {
                name: name.to_string(),
                arg: condition.find(' ').map(|_| arg.to_string()),
            },
        };
        Ok(parsed)
    }

    /// The condition name, e.g. `time-before`.
    pub fn name(&self) -> &str {
        match self {
            Condition::TimeBefore(_) => TIME_BEFORE,
            Condition::Allow(_) => ALLOW,
            Condition::Deny(_) => DENY,
            Condition::Declared { .. } => DECLARED,
            Condition::Error(_) => ERROR,
            Condition::Unrecognized { name, .. } => name,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::TimeBefore(expiry) => write!(f, "{TIME_BEFORE} {}", format_time(expiry)),
            Condition::Allow(actions) if actions.is_empty() => f.write_str(ALLOW),
            Condition::Allow(actions) => write!(f, "{ALLOW} {}", actions.join(" ")),
            Condition::Deny(actions) if actions.is_empty() => f.write_str(DENY),
            Condition::Deny(actions) => write!(f, "{DENY} {}", actions.join(" ")),
            Condition::Declared { key, value } => write!(f, "{DECLARED} {key} {value}"),
            Condition::Error(message) => write!(f, "{ERROR} {message}"),
            Condition::Unrecognized { name, arg: None } => f.write_str(name),
            Condition::Unrecognized {
                name,
                arg: Some(arg),
            } => write!(f, "{name} {arg}"),
        }
    }
}

/// Formats an instant the way `time-before` conditions carry it: UTC, `Z`
/// suffix, and only as many fractional digits as needed.
pub fn format_time(instant: &DateTime<Utc>) -> String {
    let formatted = instant.to_rfc3339_opts(SecondsFormat::Nanos, false);
    // Nanos always writes nine fractional digits and an offset of +00:00.
    let local = formatted.strip_suffix("+00:00").unwrap_or(&formatted);
    let trimmed = local.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}Z")
}

/// Parses a `time-before` argument.
pub fn parse_time(arg: &str) -> Result<DateTime<Utc>, ConditionError> {
    DateTime::parse_from_rfc3339(arg)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|_| ConditionError::InvalidTime(arg.to_string()))
}

fn fields(arg: &str) -> Vec<String> {
    arg.split_whitespace().map(str::to_string).collect()
}
