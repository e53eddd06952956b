//! Fuzz target for Envelope::from_bytes and decrypt_envelope
//!
//! Feeds arbitrary bytes where a downloaded secure file is expected.
//!
//! # Invariants
//!
//! - Decoding and decryption NEVER panic
//! - Arbitrary bytes never authenticate under a fixed key
//! - Anything that decodes re-encodes to the same bytes

#![no_main]

use libfuzzer_sys::fuzz_target;
use vanish_crypto::{Envelope, KEY_SIZE, KeyMaterial, decrypt_envelope};

fuzz_target!(|data: &[u8]| {
    let Ok(envelope) = Envelope::from_bytes(data) else {
        return;
    };
    assert_eq!(envelope.to_bytes(), data);

    let master = KeyMaterial::from_bytes([0x42; KEY_SIZE]);
    assert!(decrypt_envelope(&envelope, &master, "00000000000000000000000000000000/file/0").is_err());
});
