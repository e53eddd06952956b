//! Storage abstraction for drops
//!
//! Two synchronous traits: [`DropStore`] for drop metadata, tokens and
//! clearances, and [`ObjectStore`] for file blobs. The in-memory backends live
//! here; persistent and fault-injecting ones live in the server crate.
//! Everything stays synchronous so the drop logic never awaits.

mod memory;
mod pointer;
mod retry;

pub use memory::{MemoryDropStore, MemoryObjectStore};
pub use pointer::PointerSigner;
pub use retry::Retrying;

use crate::{
    error::StorageError,
    model::{AccessToken, Clearance, Counter, DropId, DropRecord, SessionId, TokenValue},
};

/// Storage for drop records, access tokens and password clearances.
///
/// Must be Clone (shared by the service, the broker and the sweeper), Send +
/// Sync (thread-safe), and synchronous (no async methods). Implementations
/// typically share internal state via Arc, so clones access the same
/// underlying storage.
///
/// # Atomicity
///
/// [`DropStore::take_token`] and [`DropStore::increment_counter`] are single
/// read-modify-write steps. Two concurrent redemptions of one token see exactly
/// one success, and concurrent increments never lose an update.
pub trait DropStore: Clone + Send + Sync + 'static {
    /// Insert a new drop.
    ///
    /// Returns `false` without writing if a drop with the same id exists.
    fn insert_drop(&self, record: &DropRecord) -> Result<bool, StorageError>;

    /// Load a drop. `None` if it doesn't exist.
    fn load_drop(&self, id: DropId) -> Result<Option<DropRecord>, StorageError>;

    /// Delete a drop record.
    ///
    /// Idempotent. Returns whether a record was removed.
    fn delete_drop(&self, id: DropId) -> Result<bool, StorageError>;

    /// List all drop ids. Order is not guaranteed.
    fn list_drops(&self) -> Result<Vec<DropId>, StorageError>;

    /// Add one to a counter and return the new value.
    ///
    /// Returns `None` if the drop no longer exists.
    fn increment_counter(&self, id: DropId, counter: Counter)
    -> Result<Option<u64>, StorageError>;

    /// Persist a freshly minted token.
    fn put_token(&self, token: &AccessToken) -> Result<(), StorageError>;

    /// Look a token up without consuming it.
    fn load_token(&self, token: &TokenValue) -> Result<Option<AccessToken>, StorageError>;

    /// Remove and return a token, but only if it was issued for `drop_id`.
    ///
    /// A token for another drop is left in place and `None` is returned.
    /// Expired tokens are still removed and returned; rejecting them is the
    /// caller's job.
    fn take_token(
        &self,
        token: &TokenValue,
        drop_id: DropId,
    ) -> Result<Option<AccessToken>, StorageError>;

    /// Delete a token. Idempotent.
    fn delete_token(&self, token: &TokenValue) -> Result<bool, StorageError>;

    /// List all outstanding tokens.
    fn list_tokens(&self) -> Result<Vec<AccessToken>, StorageError>;

    /// Record (or refresh) a password clearance.
    fn put_clearance(&self, clearance: &Clearance) -> Result<(), StorageError>;

    /// Look a clearance up.
    fn load_clearance(
        &self,
        drop_id: DropId,
        session: SessionId,
    ) -> Result<Option<Clearance>, StorageError>;

    /// Delete one clearance. Idempotent.
    fn delete_clearance(&self, drop_id: DropId, session: SessionId)
    -> Result<bool, StorageError>;

    /// Delete every clearance for a drop. Returns how many were removed.
    fn delete_clearances(&self, drop_id: DropId) -> Result<usize, StorageError>;

    /// List all clearances.
    fn list_clearances(&self) -> Result<Vec<Clearance>, StorageError>;
}

/// Blob storage for drop files.
///
/// Same threading contract as [`DropStore`].
pub trait ObjectStore: Clone + Send + Sync + 'static {
    /// Store a blob, overwriting any previous value.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Read a blob. `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Delete blobs. Missing keys are not an error.
    fn delete(&self, keys: &[String]) -> Result<(), StorageError>;

    /// URL granting read access to `key` until `expires_at_ms`.
    fn create_temporary_url(&self, key: &str, expires_at_ms: u64) -> Result<String, StorageError>;

    /// Check a URL signature produced by [`ObjectStore::create_temporary_url`].
    ///
    /// Does not look at the clock.
    fn verify_temporary_url(&self, key: &str, expires_at_ms: u64, signature: &str) -> bool;
}
