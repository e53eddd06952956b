//! Bounded retries for transient storage failures
//!
//! Wraps any [`DropStore`] or [`ObjectStore`] and re-runs an operation while it
//! fails with a transient error, up to a fixed number of attempts. Each retry
//! is logged at `warn`. Permanent errors are returned immediately.

use super::{DropStore, ObjectStore};
use crate::{
    error::StorageError,
    model::{AccessToken, Clearance, Counter, DropId, DropRecord, SessionId, TokenValue},
};

/// Retrying decorator over a storage backend.
#[derive(Debug, Clone)]
pub struct Retrying<S> {
    inner: S,
    attempts: u32,
}

impl<S> Retrying<S> {
    /// Wrap `inner`, allowing `attempts` tries per operation (at least one).
    pub fn new(inner: S, attempts: u32) -> Self {
        Self { inner, attempts: attempts.max(1) }
    }

    /// Underlying backend.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn run<T>(
        &self,
        operation: &'static str,
        mut op: impl FnMut(&S) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let mut attempt = 1;
        loop {
            match op(&self.inner) {
                Err(err) if err.is_transient() && attempt < self.attempts => {
                    tracing::warn!(operation, attempt, error = %err, "transient storage error, retrying");
                    attempt += 1;
                },
                result => return result,
            }
        }
    }
}

impl<S: DropStore> DropStore for Retrying<S> {
    fn insert_drop(&self, record: &DropRecord) -> Result<bool, StorageError> {
        self.run("insert_drop", |s| s.insert_drop(record))
    }

    fn load_drop(&self, id: DropId) -> Result<Option<DropRecord>, StorageError> {
        self.run("load_drop", |s| s.load_drop(id))
    }

    fn delete_drop(&self, id: DropId) -> Result<bool, StorageError> {
        self.run("delete_drop", |s| s.delete_drop(id))
    }

    fn list_drops(&self) -> Result<Vec<DropId>, StorageError> {
        self.run("list_drops", |s| s.list_drops())
    }

    fn increment_counter(
        &self,
        id: DropId,
        counter: Counter,
    ) -> Result<Option<u64>, StorageError> {
        self.run("increment_counter", |s| s.increment_counter(id, counter))
    }

    fn put_token(&self, token: &AccessToken) -> Result<(), StorageError> {
        self.run("put_token", |s| s.put_token(token))
    }

    fn load_token(&self, token: &TokenValue) -> Result<Option<AccessToken>, StorageError> {
        self.run("load_token", |s| s.load_token(token))
    }

    fn take_token(
        &self,
        token: &TokenValue,
        drop_id: DropId,
    ) -> Result<Option<AccessToken>, StorageError> {
        self.run("take_token", |s| s.take_token(token, drop_id))
    }

    fn delete_token(&self, token: &TokenValue) -> Result<bool, StorageError> {
        self.run("delete_token", |s| s.delete_token(token))
    }

    fn list_tokens(&self) -> Result<Vec<AccessToken>, StorageError> {
        self.run("list_tokens", |s| s.list_tokens())
    }

    fn put_clearance(&self, clearance: &Clearance) -> Result<(), StorageError> {
        self.run("put_clearance", |s| s.put_clearance(clearance))
    }

    fn load_clearance(
        &self,
        drop_id: DropId,
        session: SessionId,
    ) -> Result<Option<Clearance>, StorageError> {
        self.run("load_clearance", |s| s.load_clearance(drop_id, session))
    }

    fn delete_clearance(&self, drop_id: DropId, session: SessionId) -> Result<bool, StorageError> {
        self.run("delete_clearance", |s| s.delete_clearance(drop_id, session))
    }

    fn delete_clearances(&self, drop_id: DropId) -> Result<usize, StorageError> {
        self.run("delete_clearances", |s| s.delete_clearances(drop_id))
    }

    fn list_clearances(&self) -> Result<Vec<Clearance>, StorageError> {
        self.run("list_clearances", |s| s.list_clearances())
    }
}

impl<O: ObjectStore> ObjectStore for Retrying<O> {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.run("put_object", |o| o.put(key, bytes))
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.run("get_object", |o| o.get(key))
    }

    fn delete(&self, keys: &[String]) -> Result<(), StorageError> {
        self.run("delete_objects", |o| o.delete(keys))
    }

    fn create_temporary_url(&self, key: &str, expires_at_ms: u64) -> Result<String, StorageError> {
        self.run("create_temporary_url", |o| o.create_temporary_url(key, expires_at_ms))
    }

    fn verify_temporary_url(&self, key: &str, expires_at_ms: u64, signature: &str) -> bool {
        self.inner.verify_temporary_url(key, expires_at_ms, signature)
    }
}
