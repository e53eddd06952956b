//! Error types for drop operations.
//!
//! Two layers:
//! - [`StorageError`]: failures of a metadata or object backend
//! - [`DropError`]: the closed set of outcomes a caller of the drop service
//!   can observe
//!
//! Every cryptographic failure collapses into [`DropError::DecryptionFailed`]
//! so callers cannot distinguish a wrong key from tampered bytes.

use thiserror::Error;
use vanish_crypto::{EnvelopeError, PasswordError};

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// I/O error (file system, database, etc.)
    #[error("I/O error: {0}")]
    Io(String),

    /// Serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend did not answer within the allotted time
    #[error("storage timed out after {after_ms}ms")]
    Timeout {
        /// How long we waited
        after_ms: u64,
    },

    /// Stored bytes are present but unusable
    #[error("corrupted record: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Serialization failures and corruption are deterministic and never
    /// transient.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout { .. })
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// Outcomes of drop operations that are not a successful delivery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DropError {
    /// Access token absent, expired, already redeemed or issued for another
    /// drop
    #[error("access denied")]
    AccessDenied,

    /// Drop has expired and was purged
    #[error("drop expired")]
    Expired,

    /// No drop with that id
    #[error("drop not found")]
    NotFound,

    /// Drop is password protected and this session has not verified
    #[error("password required")]
    PasswordRequired,

    /// Presented password did not match. The service reports a mismatch as
    /// `Ok(false)`; request-level surfaces map that to this variant.
    #[error("invalid password")]
    InvalidPassword,

    /// Authenticated decryption failed, whatever the cause
    #[error("decryption failed")]
    DecryptionFailed,

    /// Backend failure after retries were exhausted
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Local fragment vault is full
    #[error("quota exceeded")]
    QuotaExceeded,

    /// A drop with the requested id already exists
    #[error("drop already exists")]
    AlreadyExists,

    /// Request was malformed or violated a creation rule
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl DropError {
    /// HTTP-style status code for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::PasswordRequired | Self::InvalidPassword => 401,
            Self::AccessDenied => 403,
            Self::NotFound => 404,
            Self::AlreadyExists => 409,
            Self::Expired => 410,
            Self::DecryptionFailed => 422,
            Self::QuotaExceeded => 507,
            Self::Storage(StorageError::Timeout { .. }) => 504,
            Self::Storage(_) => 500,
        }
    }

    /// Stable machine-readable name, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AccessDenied => "access_denied",
            Self::Expired => "expired",
            Self::NotFound => "not_found",
            Self::PasswordRequired => "password_required",
            Self::InvalidPassword => "invalid_password",
            Self::DecryptionFailed => "decryption_failed",
            Self::Storage(_) => "storage",
            Self::QuotaExceeded => "quota_exceeded",
            Self::AlreadyExists => "already_exists",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    /// Shorthand for [`DropError::InvalidRequest`].
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }
}

impl From<EnvelopeError> for DropError {
    fn from(_: EnvelopeError) -> Self {
        DropError::DecryptionFailed
    }
}

impl From<PasswordError> for DropError {
    fn from(err: PasswordError) -> Self {
        DropError::InvalidRequest(err.to_string())
    }
}
