//! Client errors.

use thiserror::Error;
use vanish_core::{DropError, StorageError};
use vanish_crypto::EnvelopeError;

/// Errors from drafting, link handling, the fragment vault and opening.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    /// A share link could not be parsed
    #[error("invalid share link: {reason}")]
    InvalidLink {
        /// What was wrong with it
        reason: String,
    },

    /// No live first fragment is held for this drop
    #[error("no fragment pending for this drop")]
    NothingPending,

    /// Both fragments came from the same slot
    #[error("both fragments are {slot}")]
    SameFragment {
        /// The repeated slot
        slot: crate::links::FragmentSlot,
    },

    /// Drop-level failure (decryption, quota, storage, invalid content)
    #[error(transparent)]
    Drop(#[from] DropError),
}

impl ClientError {
    pub(crate) fn invalid_link(reason: impl Into<String>) -> Self {
        Self::InvalidLink { reason: reason.into() }
    }
}

impl From<EnvelopeError> for ClientError {
    fn from(err: EnvelopeError) -> Self {
        Self::Drop(DropError::from(err))
    }
}

impl From<StorageError> for ClientError {
    fn from(err: StorageError) -> Self {
        Self::Drop(DropError::Storage(err))
    }
}
