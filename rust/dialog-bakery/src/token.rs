//! Tokens as the authorizer sees them.
//!
//! The cryptography of a token is someone else's business. This module
//! only fixes what the authorizer needs: an id following the
//! `entity [SP storage-id]` convention, a way to verify a token together
//! with its discharges, and a way to mint a new one.

use std::fmt;

use dialog_caveat::Caveat;
use thiserror::Error;

/// A bearer token with an id.
pub trait Token: Clone + fmt::Debug + Send + Sync + 'static {
    /// The raw token id.
    fn id(&self) -> &[u8];
}

/// A primary token together with discharges for its third party caveats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSlice<T> {
    /// The token being presented.
    pub primary: T,
    /// Discharges for the primary's third party caveats.
    pub discharges: Vec<T>,
}

impl<T> TokenSlice<T> {
    /// A slice with discharges.
    pub fn new(primary: T, discharges: Vec<T>) -> Self {
        Self {
            primary,
            discharges,
        }
    }
}

impl<T> From<T> for TokenSlice<T> {
    fn from(primary: T) -> Self {
        Self::new(primary, Vec::new())
    }
}

/// Errors reading or building a [`TokenId`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenIdError {
    /// The id has no bytes at all.
    #[error("empty token id")]
    Empty,

    /// The entity part is not UTF-8.
    #[error("token entity is not valid UTF-8")]
    InvalidEntity,

    /// The entity part is empty.
    #[error("token id has an empty entity")]
    EmptyEntity,

    /// The entity contains a space and could not be read back.
    #[error("token entity {0:?} contains a space")]
    EntityContainsSpace(String),

    /// The storage id is empty.
    #[error("token id has an empty storage id")]
    EmptyStorageId,
}

/// A token id: the entity the token is scoped to and the storage id of its
/// root key.
///
/// Encoded as `entity SP storage-id`. When the storage id is the entity
/// itself the id is just the entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenId {
    entity: String,
    storage_id: Vec<u8>,
}

impl TokenId {
    /// A token id for `entity` whose root key is stored under `storage_id`.
    pub fn new(entity: impl Into<String>, storage_id: impl Into<Vec<u8>>) -> Result<Self, TokenIdError> {
        let entity = entity.into();
        let storage_id = storage_id.into();
        if entity.is_empty() {
            return Err(TokenIdError::EmptyEntity);
        }
        if entity.contains(' ') {
            return Err(TokenIdError::EntityContainsSpace(entity));
        }
        if storage_id.is_empty() {
            return Err(TokenIdError::EmptyStorageId);
        }
        Ok(Self { entity, storage_id })
    }

    /// Splits a raw id at its first space.
    pub fn parse(id: &[u8]) -> Result<Self, TokenIdError> {
        if id.is_empty() {
            return Err(TokenIdError::Empty);
        }
        let (entity, storage_id) = match id.iter().position(|byte| *byte == b' ') {
            Some(index) => (&id[..index], &id[index + 1..]),
            None => (id, id),
        };
        if entity.is_empty() {
            return Err(TokenIdError::EmptyEntity);
        }
        if storage_id.is_empty() {
            return Err(TokenIdError::EmptyStorageId);
        }
        let entity = std::str::from_utf8(entity).map_err(|_| TokenIdError::InvalidEntity)?;
        Ok(Self {
            entity: entity.to_string(),
            storage_id: storage_id.to_vec(),
        })
    }

    /// The entity the token is scoped to.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Where the root key lives.
    pub fn storage_id(&self) -> &[u8] {
        &self.storage_id
    }

    /// The encoded id.
    pub fn to_bytes(&self) -> Vec<u8> {
        if self.storage_id == self.entity.as_bytes() {
            return self.storage_id.clone();
        }
        let mut bytes = Vec::with_capacity(self.entity.len() + 1 + self.storage_id.len());
        bytes.extend_from_slice(self.entity.as_bytes());
        bytes.push(b' ');
        bytes.extend_from_slice(&self.storage_id);
        bytes
    }
}

/// Secret a token chain is rooted in.
#[derive(Clone, PartialEq, Eq)]
pub struct RootKey(Vec<u8>);

impl RootKey {
    /// Wraps key bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for RootKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RootKey(..)")
    }
}

/// Public half of the service key, handed to identity services so they can
/// address third party caveats to this service.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    /// Wraps key bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({} bytes)", self.0.len())
    }
}

/// The service key pair.
#[derive(Clone)]
pub struct KeyPair {
    public: PublicKey,
    private: Vec<u8>,
}

impl KeyPair {
    /// A key pair from its halves.
    pub fn new(public: PublicKey, private: impl Into<Vec<u8>>) -> Self {
        Self {
            public,
            private: private.into(),
        }
    }

    /// The public half.
    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    /// The private half.
    pub fn private_bytes(&self) -> &[u8] {
        &self.private
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Why a token slice failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    /// The chain does not match the root key.
    #[error("signature mismatch after caveat verification")]
    SignatureMismatch,

    /// A third party caveat has no matching discharge.
    #[error("cannot find discharge token for caveat {0:?}")]
    MissingDischarge(String),

    /// Any other defect in the token.
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// Cryptographic verification of a token slice.
pub trait TokenVerifier<T: Token>: Send + Sync {
    /// Verifies `slice` against `root_key` and returns the first party
    /// conditions of the primary and its discharges, in order, without
    /// evaluating them.
    fn verify(&self, slice: &TokenSlice<T>, root_key: &RootKey) -> Result<Vec<String>, VerificationError>;
}

/// Everything needed to mint a token.
#[derive(Debug, Clone, Copy)]
pub struct MintRequest<'a> {
    /// Root key of the new token.
    pub root_key: &'a RootKey,
    /// Its id.
    pub id: &'a TokenId,
    /// Location of the minting service.
    pub location: &'a str,
    /// Caveats in the order they are added.
    pub caveats: &'a [Caveat],
}

/// Why a token could not be minted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MintError {
    /// A third party caveat could not be addressed to its location.
    #[error("cannot add third party caveat for {location:?}: {reason}")]
    ThirdParty {
        /// Location of the caveat.
        location: String,
        /// What went wrong.
        reason: String,
    },

    /// Any other minting failure.
    #[error("cannot mint token: {0}")]
    Other(String),
}

/// Creation of new tokens.
pub trait TokenMinter<T: Token>: Send + Sync {
    /// Mints a token from `request`.
    fn mint(&self, request: MintRequest<'_>) -> Result<T, MintError>;
}
