//! Error types for envelope operations

use thiserror::Error;

/// Errors from envelope and key-half operations.
///
/// Decryption deliberately has a single failure variant. Wrong key, wrong
/// content id, tampered ciphertext and malformed input are indistinguishable to
/// the caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Authentication failed or the envelope could not be opened
    #[error("decryption failed")]
    DecryptionFailed,

    /// Invalid key material length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected key length
        expected: usize,
        /// Actual key length
        actual: usize,
    },

    /// Serialized envelope or key half is not well formed
    #[error("invalid encoding")]
    InvalidEncoding,
}
