//! Per-envelope key derivation using HKDF

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{KEY_SIZE, SALT_SIZE, split::KeyMaterial};

/// Label used for envelope key derivation
const ENVELOPE_KEY_LABEL: &[u8] = b"vanish/envelope/v1:";

/// Derive the AES-256 key for one envelope.
///
/// HKDF-SHA256 with the envelope salt, keyed by the master, with the content id
/// folded into the info string for domain separation.
///
/// # Security
///
/// - Different salts produce unrelated keys under the same master
/// - Different content ids produce unrelated keys under the same salt
/// - Deterministic: same inputs always produce same output
pub fn derive_item_key(
    master: &KeyMaterial,
    salt: &[u8; SALT_SIZE],
    content_id: &str,
) -> Zeroizing<[u8; KEY_SIZE]> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), master.as_bytes());

    let mut info = Vec::with_capacity(ENVELOPE_KEY_LABEL.len() + content_id.len());
    info.extend_from_slice(ENVELOPE_KEY_LABEL);
    info.extend_from_slice(content_id.as_bytes());

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    let Ok(()) = hkdf.expand(&info, &mut key[..]) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    key
}
