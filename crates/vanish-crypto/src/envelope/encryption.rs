//! Envelope encryption using `AES-256-GCM`
//!
//! All functions are pure - random bytes must be provided by the caller.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use serde::{Deserialize, Serialize};

use super::{
    IV_SIZE, SALT_SIZE, derivation::derive_item_key, error::EnvelopeError, split::KeyMaterial,
};

/// GCM tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Fresh randomness consumed by one encryption.
///
/// Callers MUST draw both fields from a cryptographically secure RNG and never
/// reuse them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SealRandomness {
    /// AES-GCM nonce
    pub iv: [u8; IV_SIZE],
    /// HKDF salt
    pub salt: [u8; SALT_SIZE],
}

/// The output of one authenticated encryption.
///
/// Meaningless without both the master key and the exact content id used at
/// encryption time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// 96-bit nonce, unique per encryption
    pub iv: [u8; IV_SIZE],
    /// 128-bit HKDF salt (not secret)
    pub salt: [u8; SALT_SIZE],
    /// Ciphertext including the 16-byte GCM tag
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_SIZE)
    }

    /// Flat encoding: `iv || salt || ciphertext`.
    ///
    /// Used for envelopes stored as object-storage blobs.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(IV_SIZE + SALT_SIZE + self.ciphertext.len());
        bytes.extend_from_slice(&self.iv);
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Parse the flat encoding produced by [`Envelope::to_bytes`].
    ///
    /// # Errors
    ///
    /// - `InvalidEncoding`: input shorter than `iv || salt || tag`
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < IV_SIZE + SALT_SIZE + TAG_SIZE {
            return Err(EnvelopeError::InvalidEncoding);
        }

        let (iv, rest) = bytes.split_at(IV_SIZE);
        let (salt, ciphertext) = rest.split_at(SALT_SIZE);

        let mut envelope =
            Self { iv: [0u8; IV_SIZE], salt: [0u8; SALT_SIZE], ciphertext: ciphertext.to_vec() };
        envelope.iv.copy_from_slice(iv);
        envelope.salt.copy_from_slice(salt);

        Ok(envelope)
    }
}

/// Encrypt bytes under `master`, bound to `content_id`.
///
/// # Security
///
/// - A fresh item key is derived per envelope from the random salt
/// - `content_id` is authenticated as associated data
/// - Caller MUST provide cryptographically secure random bytes in production
pub fn encrypt_envelope(
    plaintext: &[u8],
    master: &KeyMaterial,
    content_id: &str,
    randomness: SealRandomness,
) -> Envelope {
    let item_key = derive_item_key(master, &randomness.salt, content_id);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&item_key[..]));
    let payload = Payload { msg: plaintext, aad: content_id.as_bytes() };

    let Ok(ciphertext) = cipher.encrypt(Nonce::from_slice(&randomness.iv), payload) else {
        unreachable!("AES-256-GCM encryption cannot fail below the 64 GiB message limit");
    };

    Envelope { iv: randomness.iv, salt: randomness.salt, ciphertext }
}

/// Decrypt an envelope under `master`, checking it was bound to `content_id`.
///
/// # Errors
///
/// - `DecryptionFailed`: for every failure, whatever its cause
pub fn decrypt_envelope(
    envelope: &Envelope,
    master: &KeyMaterial,
    content_id: &str,
) -> Result<Vec<u8>, EnvelopeError> {
    if envelope.ciphertext.len() < TAG_SIZE {
        return Err(EnvelopeError::DecryptionFailed);
    }

    let item_key = derive_item_key(master, &envelope.salt, content_id);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&item_key[..]));
    let payload = Payload { msg: envelope.ciphertext.as_slice(), aad: content_id.as_bytes() };

    cipher
        .decrypt(Nonce::from_slice(&envelope.iv), payload)
        .map_err(|_| EnvelopeError::DecryptionFailed)
}
