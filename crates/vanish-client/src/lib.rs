//! Client
//!
//! The creating and viewing side of secure drops. Everything the service must
//! never see lives here: the master key, its two halves, and the plaintext of
//! secure content.
//!
//! # Flow
//!
//! ```text
//! creator                                 viewer
//! ───────                                 ──────
//! SecureDraft::seal ──▶ NewDrop ──▶ service ──▶ Delivery
//!        │                                       │
//!        └─▶ KeyFragments ─▶ ShareLinks ─▶ FragmentVault ─▶ open_sealed
//! ```
//!
//! # Components
//!
//! - [`SecureDraft`]: seals content under a fresh split key
//! - [`ShareLinks`] and [`ShareLink`]: the two links carrying `k1` and `k2`
//! - [`FragmentVault`]: holds the first fragment until the second arrives
//! - [`open_sealed`] and [`open_object`]: decrypt delivered content

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod draft;
mod error;
mod links;
mod open;
pub mod vault;

pub use draft::{Draft, KeyFragments, SecureDraft};
pub use error::ClientError;
pub use links::{FragmentSlot, ShareLink, ShareLinks};
pub use open::{OpenedContent, open_object, open_sealed};
pub use vanish_core::{
    Environment,
    model::{DropId, SessionId},
};
pub use vault::{FileVaultBackend, FragmentVault, MemoryVaultBackend, VaultBackend};
