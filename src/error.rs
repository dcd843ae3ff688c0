use thiserror::Error;

use crate::dag::{CanonError, DagError, IdentityError};
use crate::feed::{FeedError, IpfsError, MessageError};

/// Crate-level convenience error.
///
/// A thin wrapper over the canonical capability errors; each subsystem keeps
/// its own bounded error enum.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Dag(#[from] DagError),

    #[error(transparent)]
    Canon(#[from] CanonError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Ipfs(#[from] IpfsError),
}

impl Error {
    /// True when the error is a missing ref/object/resolve miss rather than
    /// a real failure.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Dag(e) => e.is_not_found(),
            _ => false,
        }
    }
}
