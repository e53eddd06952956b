//! Server error types.

use std::fmt;

use vanish_core::{DropError, StorageError};

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, bad signing secret, etc.).
    ///
    /// These are fatal errors that prevent server startup. Fix configuration
    /// and restart.
    Config(String),

    /// Socket or filesystem error (bind failure, listener I/O, task join).
    ///
    /// May be transient (network issues) or fatal (bind address in use).
    /// Check error message for details.
    Io(String),

    /// Drop service error.
    ///
    /// Wraps errors from the drop logic and its storage. See `DropError`.
    Drop(DropError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Io(msg) => write!(f, "i/o error: {msg}"),
            Self::Drop(err) => write!(f, "drop error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Drop(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DropError> for ServerError {
    fn from(err: DropError) -> Self {
        Self::Drop(err)
    }
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        Self::Drop(DropError::Storage(err))
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
