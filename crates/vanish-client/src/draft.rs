//! Secure drafting
//!
//! Seals content on the creator's side before it is sent anywhere. The drop id
//! is allocated here because every envelope is bound to it: a ciphertext moved
//! to another drop, or to another slot in the same drop, fails to open.
//!
//! The master key never leaves this module. A [`Draft`] carries the request
//! for the service and the two halves for the share links, nothing else.

use vanish_core::{
    Environment,
    model::{DropId, ExpiryPolicy, NewDrop, NewFile, PlainContent, SealedContent},
};
use vanish_crypto::{Envelope, KEY_SIZE, KeyMaterial, SealRandomness, SplitKey, encrypt_envelope};

/// The two key halves of one secure drop.
///
/// Either half alone is uniformly random and says nothing about the master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFragments {
    /// Drop the halves belong to
    pub drop_id: DropId,
    /// First half, carried by the primary link
    pub k1: KeyMaterial,
    /// Second half, carried by the secondary link
    pub k2: KeyMaterial,
}

/// A sealed creation request and the fragments needed to open it.
#[derive(Debug, Clone)]
pub struct Draft {
    /// Request to hand to the drop service
    pub request: NewDrop,
    /// Key halves to hand to viewers
    pub fragments: KeyFragments,
}

/// Seals content under a fresh split key.
#[derive(Debug, Clone)]
pub struct SecureDraft<E: Environment> {
    env: E,
}

impl<E: Environment> SecureDraft<E> {
    /// Drafts drawing ids and key material from `env`.
    pub fn new(env: E) -> Self {
        Self { env }
    }

    /// Seal `content` into a secure creation request.
    ///
    /// Text, each link and each file get their own envelope under their own
    /// content id. Files are flat-encoded so the service can store them as
    /// opaque blobs. Ceilings, owner and password can be added to
    /// [`Draft::request`] afterwards.
    pub fn seal(&self, content: PlainContent, expiry: ExpiryPolicy) -> Draft {
        let drop_id = DropId::random(&self.env);
        let split = SplitKey::from_random(
            self.env.random_array::<KEY_SIZE>(),
            self.env.random_array::<KEY_SIZE>(),
        );

        let sealed = match content {
            PlainContent::Text(text) => {
                SealedContent::Text(self.envelope(text.as_bytes(), &split, &drop_id.text_content_id()))
            },
            PlainContent::Url(links) => SealedContent::Url(
                links
                    .iter()
                    .enumerate()
                    .map(|(i, link)| self.envelope(link.as_bytes(), &split, &drop_id.link_content_id(i)))
                    .collect(),
            ),
            PlainContent::File(file) => SealedContent::File(self.seal_file(file, 0, drop_id, &split)),
            PlainContent::Bundle(files) => SealedContent::Bundle(
                files
                    .into_iter()
                    .enumerate()
                    .map(|(i, file)| self.seal_file(file, i, drop_id, &split))
                    .collect(),
            ),
        };

        tracing::debug!(%drop_id, "sealed secure draft");

        Draft {
            request: NewDrop::secure(drop_id, sealed, expiry),
            fragments: KeyFragments { drop_id, k1: split.k1().clone(), k2: split.k2().clone() },
        }
    }

    fn seal_file(&self, file: NewFile, index: usize, drop_id: DropId, split: &SplitKey) -> NewFile {
        let envelope = self.envelope(&file.bytes, split, &drop_id.file_content_id(index));
        NewFile { name: file.name, mime_type: file.mime_type, bytes: envelope.to_bytes() }
    }

    fn envelope(&self, plaintext: &[u8], split: &SplitKey, content_id: &str) -> Envelope {
        let randomness = SealRandomness { iv: self.env.random_array(), salt: self.env.random_array() };
        encrypt_envelope(plaintext, split.master(), content_id, randomness)
    }
}
