//! Test doubles for `dialog-bakery`.
//!
//! [`TestToken`] is a minimal HMAC-SHA256 chained token with first and third
//! party caveats. It is good enough to exercise the authorizer end to end
//! but makes no attempt at the confidentiality a real token format needs:
//! third party caveat keys travel in the clear.

mod token;
pub use token::*;

mod identity;
pub use identity::*;

mod acl;
pub use acl::*;

mod store;
pub use store::*;

mod fixture;
pub use fixture::*;
