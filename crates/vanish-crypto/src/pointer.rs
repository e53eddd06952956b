//! Signatures for short-lived object pointers
//!
//! A pointer authorizes reading one storage key until a deadline. The tag is
//! HMAC-SHA256 over the length-prefixed key and the deadline, so neither field
//! can be stretched into the other.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Size of the pointer signing secret.
pub const POINTER_SECRET_SIZE: usize = 32;

/// Compute the tag for `storage_key` valid until `expires_at_ms`.
pub fn sign_pointer(
    secret: &[u8; POINTER_SECRET_SIZE],
    storage_key: &str,
    expires_at_ms: u64,
) -> [u8; 32] {
    let mac = keyed_mac(secret, storage_key, expires_at_ms);
    mac.finalize().into_bytes().into()
}

/// Check a tag in constant time.
///
/// Does not look at the clock; deadline enforcement is the caller's job.
pub fn verify_pointer(
    secret: &[u8; POINTER_SECRET_SIZE],
    storage_key: &str,
    expires_at_ms: u64,
    tag: &[u8],
) -> bool {
    keyed_mac(secret, storage_key, expires_at_ms).verify_slice(tag).is_ok()
}

fn keyed_mac(secret: &[u8; POINTER_SECRET_SIZE], storage_key: &str, expires_at_ms: u64) -> HmacSha256 {
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(secret) else {
        unreachable!("HMAC accepts keys of any length");
    };
    mac.update(&(storage_key.len() as u64).to_be_bytes());
    mac.update(storage_key.as_bytes());
    mac.update(&expires_at_ms.to_be_bytes());
    mac
}
