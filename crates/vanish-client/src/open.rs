//! Opening delivered content
//!
//! Standard deliveries are already plain and pass through. Sealed ones are
//! opened under the master key rebuilt from both fragments. Every failure,
//! whatever its cause, is reported as [`DropError::DecryptionFailed`].

use vanish_core::{
    DropError,
    model::{DeliveredContent, Delivery, DropId, ObjectPointer},
};
use vanish_crypto::{Envelope, KeyMaterial, decrypt_envelope};

/// Content ready to show to a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenedContent {
    /// Text
    Text(String),
    /// Links
    Url(Vec<String>),
    /// File pointers; sealed files still go through [`open_object`]
    Files {
        /// Pointers to the blobs
        pointers: Vec<ObjectPointer>,
        /// Whether each blob is an envelope
        sealed: bool,
    },
}

/// Open a delivery.
///
/// `master` is only consulted for sealed content.
///
/// # Errors
///
/// - `DecryptionFailed`: wrong key, wrong drop, tampering or non-UTF-8
///   plaintext
pub fn open_sealed(delivery: Delivery, master: &KeyMaterial) -> Result<OpenedContent, DropError> {
    let drop_id = delivery.status.id;
    match delivery.content {
        DeliveredContent::Text(text) => Ok(OpenedContent::Text(text)),
        DeliveredContent::Url(links) => Ok(OpenedContent::Url(links)),
        DeliveredContent::Files(pointers) => Ok(OpenedContent::Files { pointers, sealed: false }),
        DeliveredContent::SealedText(envelope) => {
            Ok(OpenedContent::Text(open_text(&envelope, master, &drop_id.text_content_id())?))
        },
        DeliveredContent::SealedUrl(envelopes) => {
            let links = envelopes
                .iter()
                .enumerate()
                .map(|(i, envelope)| open_text(envelope, master, &drop_id.link_content_id(i)))
                .collect::<Result<_, _>>()?;
            Ok(OpenedContent::Url(links))
        },
        DeliveredContent::SealedFiles(pointers) => {
            Ok(OpenedContent::Files { pointers, sealed: true })
        },
    }
}

/// Decrypt the downloaded bytes of file `index` of `drop_id`.
///
/// # Errors
///
/// - `DecryptionFailed`: malformed envelope, wrong key, or bytes belonging to
///   another file or drop
pub fn open_object(
    bytes: &[u8],
    master: &KeyMaterial,
    drop_id: DropId,
    index: usize,
) -> Result<Vec<u8>, DropError> {
    let envelope = Envelope::from_bytes(bytes)?;
    Ok(decrypt_envelope(&envelope, master, &drop_id.file_content_id(index))?)
}

fn open_text(envelope: &Envelope, master: &KeyMaterial, content_id: &str) -> Result<String, DropError> {
    let plaintext = decrypt_envelope(envelope, master, content_id)?;
    String::from_utf8(plaintext).map_err(|_| DropError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use vanish_core::model::{
        ContentKind, DropStatus, ExpiryPolicy, NewContent, NewFile, PlainContent, SealedContent,
    };
    use vanish_crypto::{KEY_SIZE, combine};
    use vanish_harness::SimEnv;

    use super::*;
    use crate::SecureDraft;

    fn delivery(id: DropId, content: DeliveredContent) -> Delivery {
        let status = DropStatus {
            id,
            kind: ContentKind::Text,
            secure: true,
            password_protected: false,
            expiry: ExpiryPolicy::Session,
            max_scans: None,
            max_downloads: None,
            scan_count: 1,
            download_count: 0,
            created_at_ms: 0,
            owner: None,
            files: Vec::new(),
        };
        Delivery { status, content }
    }

    #[test]
    fn sealed_links_open_in_order() {
        let draft = SecureDraft::new(SimEnv::with_seed(1))
            .seal(PlainContent::Url(vec!["https://a".into(), "https://b".into()]), ExpiryPolicy::Session);
        let NewContent::Secure(SealedContent::Url(links)) = draft.request.content else {
            panic!("expected sealed links");
        };
        let master = combine(&draft.fragments.k1, &draft.fragments.k2);

        let opened =
            open_sealed(delivery(draft.fragments.drop_id, DeliveredContent::SealedUrl(links)), &master)
                .unwrap();
        assert_eq!(opened, OpenedContent::Url(vec!["https://a".into(), "https://b".into()]));
    }

    #[test]
    fn wrong_master_or_drop_fails_generically() {
        let draft = SecureDraft::new(SimEnv::with_seed(2))
            .seal(PlainContent::Text("secret".into()), ExpiryPolicy::Session);
        let NewContent::Secure(SealedContent::Text(envelope)) = draft.request.content else {
            panic!("expected sealed text");
        };
        let master = combine(&draft.fragments.k1, &draft.fragments.k2);

        let wrong_key = KeyMaterial::from_bytes([0; KEY_SIZE]);
        let sealed = DeliveredContent::SealedText(envelope);
        assert_eq!(
            open_sealed(delivery(draft.fragments.drop_id, sealed.clone()), &wrong_key),
            Err(DropError::DecryptionFailed)
        );
        assert_eq!(
            open_sealed(delivery(DropId::from_u128(1), sealed), &master),
            Err(DropError::DecryptionFailed)
        );
    }

    #[test]
    fn plain_content_passes_through() {
        let key = KeyMaterial::from_bytes([0; KEY_SIZE]);
        let opened =
            open_sealed(delivery(DropId::from_u128(3), DeliveredContent::Text("plain".into())), &key)
                .unwrap();
        assert_eq!(opened, OpenedContent::Text("plain".into()));
    }

    #[test]
    fn object_bytes_are_bound_to_their_index() {
        let file = NewFile {
            name: "a".into(),
            mime_type: "application/octet-stream".into(),
            bytes: b"first".to_vec(),
        };
        let draft = SecureDraft::new(SimEnv::with_seed(4))
            .seal(PlainContent::Bundle(vec![file.clone(), file]), ExpiryPolicy::Session);
        let NewContent::Secure(SealedContent::Bundle(files)) = draft.request.content else {
            panic!("expected sealed bundle");
        };
        let master = combine(&draft.fragments.k1, &draft.fragments.k2);
        let id = draft.fragments.drop_id;

        assert_eq!(open_object(&files[0].bytes, &master, id, 0).unwrap(), b"first");
        assert_eq!(open_object(&files[0].bytes, &master, id, 1), Err(DropError::DecryptionFailed));
        assert_eq!(open_object(b"short", &master, id, 0), Err(DropError::DecryptionFailed));
    }
}
