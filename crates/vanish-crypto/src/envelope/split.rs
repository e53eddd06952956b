//! Master keys and their XOR split into two halves
//!
//! # Security Properties
//!
//! - One-time pad: with `k1` uniformly random and never reused, `k1` and `k2`
//!   are each independent of the master
//! - No validation: [`combine`] cannot tell wrong halves from right ones; a
//!   wrong master fails later, at decryption

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::{KEY_SIZE, error::EnvelopeError};

/// 256 bits of key material: a master key or one of its halves.
///
/// Zeroized on drop. `Debug` never prints the bytes and equality is constant
/// time.
#[derive(Clone)]
pub struct KeyMaterial {
    bytes: [u8; KEY_SIZE],
}

impl KeyMaterial {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parse key material from a byte slice of exactly [`KEY_SIZE`] bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, EnvelopeError> {
        let bytes: [u8; KEY_SIZE] = slice.try_into().map_err(|_| {
            EnvelopeError::InvalidKeyLength { expected: KEY_SIZE, actual: slice.len() }
        })?;
        Ok(Self { bytes })
    }

    /// Parse key material from lowercase or uppercase hex.
    pub fn from_hex(encoded: &str) -> Result<Self, EnvelopeError> {
        let mut decoded = hex::decode(encoded).map_err(|_| EnvelopeError::InvalidEncoding)?;
        let parsed = Self::from_slice(&decoded);
        decoded.zeroize();
        parsed
    }

    /// Lowercase hex encoding, suitable for URL fragments.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    fn xor(&self, other: &Self) -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = self.bytes[i] ^ other.bytes[i];
        }
        Self { bytes }
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl PartialEq for KeyMaterial {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl Eq for KeyMaterial {}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(..)")
    }
}

impl Serialize for KeyMaterial {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for KeyMaterial {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut encoded = String::deserialize(deserializer)?;
        let parsed = Self::from_hex(&encoded);
        encoded.zeroize();
        parsed.map_err(de::Error::custom)
    }
}

/// A master key together with its two XOR halves.
///
/// Transient by construction: nothing in this crate serializes a `SplitKey`.
/// Hand `k1` and `k2` to their QR codes and drop the value.
#[derive(Debug, Clone)]
pub struct SplitKey {
    master: KeyMaterial,
    k1: KeyMaterial,
    k2: KeyMaterial,
}

impl SplitKey {
    /// Build a split key from caller-provided randomness.
    ///
    /// # Security
    ///
    /// Both arrays MUST come from a cryptographically secure RNG and `k1` MUST
    /// never be reused for another master.
    pub fn from_random(master: [u8; KEY_SIZE], k1: [u8; KEY_SIZE]) -> Self {
        let master = KeyMaterial::from_bytes(master);
        let k1 = KeyMaterial::from_bytes(k1);
        let k2 = master.xor(&k1);
        Self { master, k1, k2 }
    }

    /// The key that actually encrypts payloads.
    pub fn master(&self) -> &KeyMaterial {
        &self.master
    }

    /// First half, embedded in the primary QR code.
    pub fn k1(&self) -> &KeyMaterial {
        &self.k1
    }

    /// Second half, embedded in the secondary QR code.
    pub fn k2(&self) -> &KeyMaterial {
        &self.k2
    }
}

/// Rebuild a master key from its two halves.
///
/// Pure XOR. Wrong halves silently produce a wrong master.
pub fn combine(k1: &KeyMaterial, k2: &KeyMaterial) -> KeyMaterial {
    k1.xor(k2)
}

/// Rebuild a master key from raw halves, checking only their lengths.
pub fn combine_slices(k1: &[u8], k2: &[u8]) -> Result<KeyMaterial, EnvelopeError> {
    let k1 = KeyMaterial::from_slice(k1)?;
    let k2 = KeyMaterial::from_slice(k2)?;
    Ok(combine(&k1, &k2))
}
