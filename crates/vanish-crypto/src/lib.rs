//! Vanish Cryptographic Primitives
//!
//! Cryptographic building blocks for vanish drops. Pure functions with
//! deterministic outputs. Callers provide random bytes for deterministic
//! testing.
//!
//! # Key Lifecycle
//!
//! A secure-mode drop is encrypted under a 256-bit master key that never
//! reaches the server. The master is split into two halves with XOR, each half
//! travels in its own QR code, and only a client holding both can rebuild the
//! master and open the payloads.
//!
//! ```text
//! master ─── XOR k1 ──▶ k2
//!    │
//!    ▼ HKDF(salt, "vanish/envelope/v1" || content id)
//! Item Key (per envelope)
//!    │
//!    ▼ AES-256-GCM (aad = content id)
//! Envelope { iv, salt, ciphertext }
//! ```
//!
//! Standard-mode drops use the same envelope format with a master key the
//! server retains.
//!
//! # Security
//!
//! Split Key:
//! - `k1` is uniformly random, so either half alone is independent of the
//!   master (one-time pad)
//! - Combining the wrong halves yields a wrong master silently; the failure
//!   surfaces at decryption
//!
//! Content Binding:
//! - The content id is both HKDF info and AEAD associated data
//! - An envelope moved to another content id fails authentication
//!
//! Failure Opacity:
//! - Decryption reports a single `DecryptionFailed` for wrong key, wrong
//!   content id, tampering, and malformed input alike

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod envelope;
pub mod password;
pub mod pointer;

pub use envelope::{
    Envelope, EnvelopeError, IV_SIZE, KEY_SIZE, KeyMaterial, SALT_SIZE, SealRandomness, SplitKey,
    TAG_SIZE, combine, combine_slices, decrypt_envelope, encrypt_envelope,
};
pub use password::{PASSWORD_SALT_SIZE, PasswordError, PasswordParams, hash_password, verify_password};
pub use pointer::{POINTER_SECRET_SIZE, sign_pointer, verify_pointer};
