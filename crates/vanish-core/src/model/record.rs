//! Persistent drop records
//!
//! A [`DropRecord`] is everything the service keeps about one drop. Inline
//! content (text, links) is always stored sealed; the [`Protection`] decides
//! who holds the key that opens it.

use serde::{Deserialize, Serialize};
use vanish_crypto::{Envelope, KeyMaterial};

use super::ids::{DropId, OwnerId};

/// What kind of content a drop carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// A single file
    File,
    /// Several files delivered together
    Bundle,
    /// An inline text body
    Text,
    /// One or more links
    Url,
}

/// A blob in object storage belonging to a drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Object-storage key, always [`DropId::object_key`] of its position
    pub storage_key: String,
    /// File name as uploaded
    pub original_name: String,
    /// Declared MIME type
    pub mime_type: String,
    /// Plaintext size in bytes
    pub size: u64,
}

/// Drop content as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// One file in object storage
    File {
        /// The stored blob
        object: StoredObject,
    },
    /// Several files in object storage
    Bundle {
        /// The stored blobs, in upload order
        objects: Vec<StoredObject>,
    },
    /// Sealed text body bound to [`DropId::text_content_id`]
    Text {
        /// Sealed body
        body: Envelope,
    },
    /// Sealed links, each bound to [`DropId::link_content_id`]
    Url {
        /// Sealed links, in order
        links: Vec<Envelope>,
    },
}

impl Payload {
    /// Kind of this payload.
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::File { .. } => ContentKind::File,
            Self::Bundle { .. } => ContentKind::Bundle,
            Self::Text { .. } => ContentKind::Text,
            Self::Url { .. } => ContentKind::Url,
        }
    }

    /// Blobs in object storage. Empty for inline content.
    pub fn objects(&self) -> &[StoredObject] {
        match self {
            Self::File { object } => std::slice::from_ref(object),
            Self::Bundle { objects } => objects,
            Self::Text { .. } | Self::Url { .. } => &[],
        }
    }
}

/// Who can open the sealed content.
///
/// A standard drop keeps its master key here so the service can decrypt on
/// delivery. A secure drop has no key anywhere on the service side; only the
/// two share-link fragments can rebuild it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Protection {
    /// Service-held master key
    Standard {
        /// Master key for every envelope of this drop
        key: KeyMaterial,
    },
    /// Client-side key split into two fragments
    Secure,
}

/// When a drop stops being retrievable, independent of scan and download
/// ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Absolute deadline
    At {
        /// Wall-clock deadline in Unix milliseconds
        expires_at_ms: u64,
    },
    /// Consumed by its first successful scan
    UntilFirstScan,
    /// Lives until scan or download ceilings, or an explicit delete
    Session,
}

/// Which ceiling a counter feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Successful content deliveries
    Scans,
    /// Successful download pointer issuances
    Downloads,
}

/// A stored drop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropRecord {
    /// Drop id
    pub id: DropId,
    /// Owner reference, if the creator gave one
    pub owner: Option<OwnerId>,
    /// Content
    pub payload: Payload,
    /// Key custody
    pub protection: Protection,
    /// Time-based or consumption-based expiry
    pub expiry: ExpiryPolicy,
    /// Scan ceiling, never zero
    pub max_scans: Option<u64>,
    /// Download ceiling, never zero
    pub max_downloads: Option<u64>,
    /// Successful scans so far
    pub scan_count: u64,
    /// Successful downloads so far
    pub download_count: u64,
    /// Argon2 PHC string, or a legacy unhashed password
    pub password_hash: Option<String>,
    /// Wall-clock creation time in Unix milliseconds
    pub created_at_ms: u64,
    /// Set when the drop transitions to expired
    pub expired_at_ms: Option<u64>,
}

impl DropRecord {
    /// Kind of content.
    pub fn kind(&self) -> ContentKind {
        self.payload.kind()
    }

    /// True for drops whose key only exists as two share-link fragments.
    pub fn is_secure(&self) -> bool {
        matches!(self.protection, Protection::Secure)
    }

    /// True if a password gates delivery.
    pub fn is_password_protected(&self) -> bool {
        self.password_hash.is_some()
    }

    /// Current value of a counter.
    pub fn count(&self, counter: Counter) -> u64 {
        match counter {
            Counter::Scans => self.scan_count,
            Counter::Downloads => self.download_count,
        }
    }

    /// Mutable access to a counter.
    pub fn count_mut(&mut self, counter: Counter) -> &mut u64 {
        match counter {
            Counter::Scans => &mut self.scan_count,
            Counter::Downloads => &mut self.download_count,
        }
    }

    /// Blobs in object storage.
    pub fn objects(&self) -> &[StoredObject] {
        self.payload.objects()
    }

    /// Storage keys of every blob this drop owns.
    pub fn object_keys(&self) -> Vec<String> {
        self.objects().iter().map(|o| o.storage_key.clone()).collect()
    }

    /// Redacted summary, safe to return to any caller.
    pub fn status(&self) -> DropStatus {
        DropStatus {
            id: self.id,
            kind: self.kind(),
            secure: self.is_secure(),
            password_protected: self.is_password_protected(),
            expiry: self.expiry,
            max_scans: self.max_scans,
            max_downloads: self.max_downloads,
            scan_count: self.scan_count,
            download_count: self.download_count,
            created_at_ms: self.created_at_ms,
            owner: self.owner.clone(),
            files: self
                .objects()
                .iter()
                .map(|o| FileSummary {
                    name: o.original_name.clone(),
                    mime_type: o.mime_type.clone(),
                    size: o.size,
                })
                .collect(),
        }
    }
}

/// Name, type and size of one file, without a way to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    /// File name
    pub name: String,
    /// Declared MIME type
    pub mime_type: String,
    /// Plaintext size in bytes
    pub size: u64,
}

/// Public view of a drop: metadata and counters, never content, keys or
/// password material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropStatus {
    /// Drop id
    pub id: DropId,
    /// Kind of content
    pub kind: ContentKind,
    /// Whether the key is split client-side
    pub secure: bool,
    /// Whether a password gates delivery
    pub password_protected: bool,
    /// Expiry policy
    pub expiry: ExpiryPolicy,
    /// Scan ceiling
    pub max_scans: Option<u64>,
    /// Download ceiling
    pub max_downloads: Option<u64>,
    /// Successful scans so far
    pub scan_count: u64,
    /// Successful downloads so far
    pub download_count: u64,
    /// Creation time in Unix milliseconds
    pub created_at_ms: u64,
    /// Owner reference
    pub owner: Option<OwnerId>,
    /// Files, if any
    pub files: Vec<FileSummary>,
}
