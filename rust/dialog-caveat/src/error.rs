use thiserror::Error;

/// Reasons a caveat condition string could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    /// The condition string was empty.
    #[error("empty caveat")]
    Empty,

    /// The condition string starts with a space, so it has no name.
    #[error("caveat starts with space character")]
    LeadingSpace,

    /// A `time-before` argument was not an RFC 3339 instant.
    #[error("invalid expiry time {0:?}")]
    InvalidTime(String),

    /// A `declared` argument did not hold both a key and a value.
    #[error("declared caveat has no value: {0:?}")]
    MalformedDeclared(String),
}
