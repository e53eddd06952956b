//! Storage backends for the server
//!
//! The traits and the in-memory backends come from [`vanish_core::storage`].
//! This module adds what needs a disk or exists for testing:
//!
//! - [`RedbDropStore`]: durable drop records, tokens and clearances
//! - [`FsObjectStore`]: file blobs on the local filesystem
//! - [`ChaoticStore`]: fault-injecting wrapper for either trait

mod chaotic;
mod fs_objects;
mod redb;

pub use chaotic::ChaoticStore;
pub use fs_objects::FsObjectStore;
pub use redb::RedbDropStore;
pub use vanish_core::{
    StorageError,
    storage::{DropStore, MemoryDropStore, MemoryObjectStore, ObjectStore, PointerSigner},
};
