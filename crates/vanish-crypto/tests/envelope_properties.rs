//! Property-based tests for split keys and envelopes
//!
//! These tests verify invariants that must hold for all inputs:
//! - Halves always combine back to the master
//! - Envelopes roundtrip under the same master and content id
//! - Any other content id, key half or guessed master fails closed

use proptest::prelude::*;
use vanish_crypto::{
    Envelope, EnvelopeError, IV_SIZE, KEY_SIZE, KeyMaterial, SALT_SIZE, SealRandomness, SplitKey,
    combine, decrypt_envelope, encrypt_envelope,
};

fn randomness(iv: [u8; IV_SIZE], salt: [u8; SALT_SIZE]) -> SealRandomness {
    SealRandomness { iv, salt }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: combine(k1, k2) == master for every split key
    #[test]
    fn prop_split_halves_combine_to_master(
        master in any::<[u8; KEY_SIZE]>(),
        k1 in any::<[u8; KEY_SIZE]>(),
    ) {
        let split = SplitKey::from_random(master, k1);
        prop_assert_eq!(combine(split.k1(), split.k2()), KeyMaterial::from_bytes(master));
    }

    /// Property: decrypt(encrypt(p, m, id), m, id) == p
    #[test]
    fn prop_envelope_roundtrip(
        plaintext in prop::collection::vec(any::<u8>(), 0..2048),
        master in any::<[u8; KEY_SIZE]>(),
        content_id in "[a-z0-9/]{0,48}",
        iv in any::<[u8; IV_SIZE]>(),
        salt in any::<[u8; SALT_SIZE]>(),
    ) {
        let key = KeyMaterial::from_bytes(master);
        let envelope = encrypt_envelope(&plaintext, &key, &content_id, randomness(iv, salt));

        prop_assert_eq!(decrypt_envelope(&envelope, &key, &content_id)?, plaintext);
    }

    /// Property: a different content id always fails with DecryptionFailed
    #[test]
    fn prop_other_content_id_fails(
        plaintext in prop::collection::vec(any::<u8>(), 0..512),
        master in any::<[u8; KEY_SIZE]>(),
        id in "[a-z0-9]{1,24}",
        other in "[a-z0-9]{1,24}",
        iv in any::<[u8; IV_SIZE]>(),
        salt in any::<[u8; SALT_SIZE]>(),
    ) {
        prop_assume!(id != other);

        let key = KeyMaterial::from_bytes(master);
        let envelope = encrypt_envelope(&plaintext, &key, &id, randomness(iv, salt));

        prop_assert_eq!(
            decrypt_envelope(&envelope, &key, &other),
            Err(EnvelopeError::DecryptionFailed)
        );
    }

    /// Property: one half plus a random guess never opens the envelope
    #[test]
    fn prop_single_half_with_guess_fails(
        master in any::<[u8; KEY_SIZE]>(),
        k1 in any::<[u8; KEY_SIZE]>(),
        guess in any::<[u8; KEY_SIZE]>(),
        iv in any::<[u8; IV_SIZE]>(),
        salt in any::<[u8; SALT_SIZE]>(),
    ) {
        let split = SplitKey::from_random(master, k1);
        let guess = KeyMaterial::from_bytes(guess);
        prop_assume!(guess != *split.k1() && guess != *split.k2());

        let envelope = encrypt_envelope(b"hello", split.master(), "drop", randomness(iv, salt));

        let with_k1 = combine(split.k1(), &guess);
        let with_k2 = combine(&guess, split.k2());

        prop_assert!(decrypt_envelope(&envelope, &with_k1, "drop").is_err());
        prop_assert!(decrypt_envelope(&envelope, &with_k2, "drop").is_err());
        prop_assert!(decrypt_envelope(&envelope, split.k1(), "drop").is_err());
        prop_assert!(decrypt_envelope(&envelope, split.k2(), "drop").is_err());
    }

    /// Property: flipping any single ciphertext bit fails authentication
    #[test]
    fn prop_bit_flip_fails(
        plaintext in prop::collection::vec(any::<u8>(), 1..256),
        master in any::<[u8; KEY_SIZE]>(),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = KeyMaterial::from_bytes(master);
        let mut envelope =
            encrypt_envelope(&plaintext, &key, "drop", randomness([1; IV_SIZE], [2; SALT_SIZE]));

        let index = position.index(envelope.ciphertext.len());
        envelope.ciphertext[index] ^= 1 << bit;

        prop_assert!(decrypt_envelope(&envelope, &key, "drop").is_err());
    }

    /// Property: arbitrary bytes never panic the flat decoder or the decryptor
    #[test]
    fn prop_arbitrary_bytes_fail_closed(
        bytes in prop::collection::vec(any::<u8>(), 0..256),
        master in any::<[u8; KEY_SIZE]>(),
    ) {
        let key = KeyMaterial::from_bytes(master);
        if let Ok(envelope) = Envelope::from_bytes(&bytes) {
            prop_assert!(decrypt_envelope(&envelope, &key, "drop").is_err());
        }
    }
}

#[test]
fn secure_drop_hello_scenario() {
    let split = SplitKey::from_random([0x5A; KEY_SIZE], [0xC3; KEY_SIZE]);
    let content_id = "8f14e45fceea167a5a36dedd4bea2543/text";
    let envelope = encrypt_envelope(
        b"hello",
        split.master(),
        content_id,
        randomness([9; IV_SIZE], [8; SALT_SIZE]),
    );

    let master = combine(split.k1(), split.k2());
    assert_eq!(decrypt_envelope(&envelope, &master, content_id).unwrap(), b"hello");
}
