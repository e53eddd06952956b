//! Creation requests and delivery results.

use serde::{Deserialize, Serialize};
use vanish_crypto::Envelope;

use super::{
    ids::{DropId, OwnerId, SessionId, TokenValue},
    record::{DropStatus, ExpiryPolicy},
};

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFile {
    /// File name
    pub name: String,
    /// Declared MIME type
    pub mime_type: String,
    /// Plain bytes for standard drops, a flat-encoded envelope bound to
    /// [`DropId::file_content_id`] for secure drops
    #[serde(with = "hex::serde")]
    pub bytes: Vec<u8>,
}

/// Plain content, encrypted at rest by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PlainContent {
    /// Single file
    File(NewFile),
    /// Several files
    Bundle(Vec<NewFile>),
    /// Inline text
    Text(String),
    /// Links
    Url(Vec<String>),
}

/// Content sealed by the creator under a split master key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SealedContent {
    /// Single sealed file
    File(NewFile),
    /// Several sealed files
    Bundle(Vec<NewFile>),
    /// Sealed text bound to [`DropId::text_content_id`]
    Text(Envelope),
    /// Sealed links bound to [`DropId::link_content_id`]
    Url(Vec<Envelope>),
}

/// Drop content and who protects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "content", rename_all = "snake_case")]
pub enum NewContent {
    /// Service-held key
    Standard(PlainContent),
    /// Client-held split key
    Secure(SealedContent),
}

/// Everything needed to create a drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDrop {
    /// Id to create the drop under. Required for secure content, which is
    /// bound to it; allocated by the service otherwise.
    #[serde(default)]
    pub id: Option<DropId>,
    /// Owner reference for listing
    #[serde(default)]
    pub owner: Option<OwnerId>,
    /// Content
    pub content: NewContent,
    /// Expiry policy
    pub expiry: ExpiryPolicy,
    /// Scan ceiling
    #[serde(default)]
    pub max_scans: Option<u64>,
    /// Download ceiling
    #[serde(default)]
    pub max_downloads: Option<u64>,
    /// Password gating delivery, hashed before storage
    #[serde(default)]
    pub password: Option<String>,
}

impl NewDrop {
    /// Standard drop with no ceilings, owner or password.
    pub fn standard(content: PlainContent, expiry: ExpiryPolicy) -> Self {
        Self {
            id: None,
            owner: None,
            content: NewContent::Standard(content),
            expiry,
            max_scans: None,
            max_downloads: None,
            password: None,
        }
    }

    /// Secure drop bound to `id`, with no ceilings, owner or password.
    pub fn secure(id: DropId, content: SealedContent, expiry: ExpiryPolicy) -> Self {
        Self {
            id: Some(id),
            owner: None,
            content: NewContent::Secure(content),
            expiry,
            max_scans: None,
            max_downloads: None,
            password: None,
        }
    }

    /// Set the scan ceiling.
    pub fn with_max_scans(mut self, max: u64) -> Self {
        self.max_scans = Some(max);
        self
    }

    /// Set the download ceiling.
    pub fn with_max_downloads(mut self, max: u64) -> Self {
        self.max_downloads = Some(max);
        self
    }

    /// Gate delivery behind a password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Record an owner for listing.
    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner = Some(owner);
        self
    }
}

/// A fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRequest {
    /// Drop to fetch
    pub drop_id: DropId,
    /// Access token from a previous call, if any
    #[serde(default)]
    pub token: Option<TokenValue>,
    /// Viewer session, needed for password-protected drops
    #[serde(default)]
    pub session: Option<SessionId>,
}

/// Short-lived, signed reference to one blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPointer {
    /// File name
    pub name: String,
    /// Declared MIME type
    pub mime_type: String,
    /// Plaintext size in bytes
    pub size: u64,
    /// Temporary URL
    pub url: String,
    /// Wall-clock deadline of the URL in Unix milliseconds
    pub expires_at_ms: u64,
}

/// Content as handed to a viewer.
///
/// Standard drops arrive decrypted. Secure drops arrive sealed, to be opened
/// with the two key fragments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DeliveredContent {
    /// Decrypted text
    Text(String),
    /// Decrypted links
    Url(Vec<String>),
    /// Pointers to decrypted file bytes
    Files(Vec<ObjectPointer>),
    /// Sealed text, bound to [`DropId::text_content_id`]
    SealedText(Envelope),
    /// Sealed links, bound to [`DropId::link_content_id`]
    SealedUrl(Vec<Envelope>),
    /// Pointers to sealed file bytes, bound to [`DropId::file_content_id`]
    SealedFiles(Vec<ObjectPointer>),
}

/// Successful delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Drop metadata after this delivery was counted
    pub status: DropStatus,
    /// Content
    pub content: DeliveredContent,
}

/// Result of a fetch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// No token was presented: here is one, call again with it
    TokenIssued {
        /// Fresh token
        token: TokenValue,
        /// Its deadline in Unix milliseconds
        expires_at_ms: u64,
    },
    /// Content delivered and counted
    Delivered(Delivery),
}

/// Bytes behind a temporary URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectBody {
    /// File name
    pub name: String,
    /// Declared MIME type
    pub mime_type: String,
    /// Plain bytes, or a flat-encoded envelope when `sealed`
    pub bytes: Vec<u8>,
    /// Whether the bytes still need the split key
    pub sealed: bool,
}
