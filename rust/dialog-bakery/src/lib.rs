#![warn(missing_docs)]

//! Capability-based authorization over macaroon tokens.
//!
//! A request arrives with a set of bearer tokens and wants to perform some
//! [`Operation`]s, each an action on a named entity. The [`Checker`]
//! decides whether the tokens (or, failing that, the caller's identity and
//! the operations' ACLs) allow it, and when they don't, what extra proof
//! the caller has to come back with.
//!
//! # Tokens
//!
//! The token format is not this crate's concern. A token only has to expose
//! its id, and the service supplies a [`TokenVerifier`] and a
//! [`TokenMinter`] for it. Ids follow the convention `entity [SP
//! storage-id]` (see [`TokenId`]):
//!
//! - `login` tokens authenticate the caller. Their first party caveats
//!   declare who the caller is and the [`IdentityService`] turns those
//!   declarations into an [`Identity`].
//! - Tokens scoped to an entity are capabilities for every action on that
//!   entity, narrowed by their caveats (typically `allow`).
//! - Tokens scoped to a `multi-<hash>` entity are capabilities for the set of
//!   operations stored under that name in the [`MultiOpStore`]. See
//!   [`MultiOpEntity`].
//!
//! # Deciding
//!
//! For every request an [`Authorizer`] session:
//!
//! 1. verifies the presented tokens against their root keys, skipping any
//!    that are unknown or invalid,
//! 2. marks each operation some capability token covers and whose caveats
//!    hold for its action,
//! 3. resolves the caller's identity from the first login token whose
//!    caveats hold for every requested action,
//! 4. checks whatever is left against its [`Acl`], where anonymous callers
//!    only pass public ACLs,
//! 5. checks the extra caveats the request imposes.
//!
//! Conditions a [`dialog_caveat::CaveatChecker`] could not decide are
//! returned in [`AuthInfo::pending_conditions`] and must be checked by the
//! caller before acting.
//!
//! When the caller has to log in, or has to discharge third party caveats,
//! the error is [`AuthorizeError::DischargeRequired`] carrying a freshly
//! minted token.
//!
//! # Capabilities
//!
//! [`Authorizer::capability`] mints a new token for operations that were
//! just authorized, so the caller can delegate them. The new token carries
//! the squashed conditions of every token that authorized the request (see
//! [`dialog_caveat::CaveatSquasher`]) and expires after the configured
//! capability lifetime.

mod error;
pub use error::*;

mod operation;
pub use operation::*;

mod entity;
pub use entity::*;

mod token;
pub use token::*;

mod store;
pub use store::*;

mod identity;
pub use identity::*;

mod info;
pub use info::*;

mod checker;
pub use checker::*;

mod authorizer;
pub use authorizer::*;

mod mint;
