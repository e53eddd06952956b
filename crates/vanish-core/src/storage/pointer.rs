//! Temporary URL signing shared by object-store backends.

use std::fmt;

use vanish_crypto::{POINTER_SECRET_SIZE, sign_pointer, verify_pointer};
use zeroize::Zeroizing;

/// Mints and checks `<base>/objects/<key>?expires=<ms>&sig=<hex>` URLs.
#[derive(Clone)]
pub struct PointerSigner {
    base_url: String,
    secret: Zeroizing<[u8; POINTER_SECRET_SIZE]>,
}

impl PointerSigner {
    /// Signer for URLs under `base_url`. A trailing slash is ignored.
    pub fn new(base_url: impl Into<String>, secret: [u8; POINTER_SECRET_SIZE]) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, secret: Zeroizing::new(secret) }
    }

    /// Public base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Hex signature for `key` valid until `expires_at_ms`.
    pub fn signature(&self, key: &str, expires_at_ms: u64) -> String {
        hex::encode(sign_pointer(&self.secret, key, expires_at_ms))
    }

    /// Full temporary URL.
    pub fn url(&self, key: &str, expires_at_ms: u64) -> String {
        format!(
            "{}/objects/{key}?expires={expires_at_ms}&sig={}",
            self.base_url,
            self.signature(key, expires_at_ms)
        )
    }

    /// Constant-time check of a hex signature. Malformed hex never verifies.
    pub fn verify(&self, key: &str, expires_at_ms: u64, signature: &str) -> bool {
        let Ok(tag) = hex::decode(signature) else {
            return false;
        };
        verify_pointer(&self.secret, key, expires_at_ms, &tag)
    }
}

impl fmt::Debug for PointerSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointerSigner").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}
