//! Envelopes: split-key authenticated encryption bound to a content id
//!
//! # Architecture
//!
//! ```text
//! SplitKey { master, k1, k2 }
//!        │
//!        ▼ HKDF-SHA256(salt, label || content id)
//! Item Key
//!        │
//!        ▼ AES-256-GCM(iv, aad = content id)
//! Envelope
//! ```
//!
//! # Security Properties
//!
//! - Per-envelope keys: a fresh salt means master reuse never reduces to
//!   nonce reuse under a single AES key
//! - Content binding: changing the content id fails authentication
//! - Opaque failures: every decryption failure is `DecryptionFailed`

pub mod derivation;
pub mod encryption;
pub mod error;
pub mod split;

pub use derivation::derive_item_key;
pub use encryption::{Envelope, SealRandomness, TAG_SIZE, decrypt_envelope, encrypt_envelope};
pub use error::EnvelopeError;
pub use split::{KeyMaterial, SplitKey, combine, combine_slices};

/// Size of master keys and key halves (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of the AES-GCM nonce (96 bits).
pub const IV_SIZE: usize = 12;

/// Size of the HKDF salt (128 bits).
pub const SALT_SIZE: usize = 16;
