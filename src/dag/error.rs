//! Capability errors for the DAG store.
//!
//! Bounded and stable: these represent domain failures (missing refs,
//! tombstoned nodes, malformed on-disk data), not library internals.

use thiserror::Error;

use super::canon::CanonError;

/// Store, index, and repository errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DagError {
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("node deleted: {0}")]
    Deleted(String),

    #[error("decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    #[error(transparent)]
    Canon(#[from] CanonError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DagError {
    pub(crate) fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        DagError::NotFound {
            what,
            id: id.into(),
        }
    }

    pub(crate) fn decode(what: &'static str, err: impl std::fmt::Display) -> Self {
        DagError::Decode {
            what,
            reason: err.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DagError::NotFound { .. })
    }
}

/// Identity and DID codec errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IdentityError {
    #[error("cannot determine home directory")]
    NoHome,

    #[error("parse identity file: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("invalid did:key format: {0}")]
    InvalidDid(String),

    #[error("invalid base58 character in DID")]
    InvalidBase58,

    #[error("invalid multicodec prefix for Ed25519 key")]
    WrongMulticodec,

    #[error("key material must be 32 bytes (got {0})")]
    KeyLength(usize),

    #[error("decode key material: {0}")]
    DecodeKey(#[from] base64::DecodeError),

    #[error("invalid Ed25519 key: {0}")]
    Key(#[from] ed25519_dalek::SignatureError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
