#![warn(missing_docs)]

//! First-party caveat conditions.
//!
//! Tokens presented to a service carry an ordered list of caveat
//! conditions, each a short string of the form `name [argument]`. This
//! crate gives those strings a typed reading ([`Condition`]), evaluates
//! them against a request ([`FirstPartyChecker`]) and reduces a set of them
//! to the minimal equivalent set when a capability is re-issued
//! ([`CaveatSquasher`]).
//!
//! # Standard conditions
//!
//! | Name | Argument | Satisfied when |
//! |------|----------|----------------|
//! | `time-before` | RFC 3339 instant | the check happens before the instant |
//! | `allow` | space separated actions | every requested action is listed |
//! | `deny` | space separated actions | no requested action is listed |
//! | `declared` | `key value` | the token declares `key` as exactly `value` |
//! | `error` | message | never |
//!
//! Conditions with any other name are handed to a service supplied
//! [`CaveatChecker`]. Without one they are denied.
//!
//! ```rust
//! use chrono::{TimeDelta, Utc};
//! use dialog_caveat::{Caveat, FirstPartyChecker};
//!
//! let conditions = vec![
//!     Caveat::time_before(Utc::now() + TimeDelta::minutes(5)).condition,
//!     Caveat::allow(["read"]).condition,
//! ];
//!
//! let checker = FirstPartyChecker::new();
//! let checked = checker
//!     .check_all(&conditions, &["read".to_string()], Utc::now())
//!     .unwrap();
//! assert!(checked.pending.is_empty());
//!
//! assert!(
//!     checker
//!         .check_all(&conditions, &["write".to_string()], Utc::now())
//!         .is_err()
//! );
//! ```

mod error;
pub use error::*;

mod condition;
pub use condition::*;

mod caveat;
pub use caveat::*;

mod declared;
pub use declared::*;

mod checker;
pub use checker::*;

mod squash;
pub use squash::*;
