//! A drop store that stalls or fails chosen calls.
//!
//! Wraps any [`DropStore`]. Stalled calls block the calling thread for a fixed
//! delay before forwarding, which drives request timeouts and stuck sweeps
//! with real blocking work. Failed calls return `StorageError::Io` without
//! reaching the inner store. Unlike the seeded chaos wrapper, the faults are
//! exact and repeatable per call.

use std::{sync::Arc, thread, time::Duration};

use vanish_core::{
    StorageError,
    model::{AccessToken, Clearance, Counter, DropId, DropRecord, SessionId, TokenValue},
    storage::DropStore,
};

/// [`DropStore`] methods that can be stalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreCall {
    /// `insert_drop`
    InsertDrop,
    /// `load_drop`
    LoadDrop,
    /// `delete_drop`
    DeleteDrop,
    /// `list_drops`
    ListDrops,
    /// `increment_counter`
    IncrementCounter,
    /// `put_token`
    PutToken,
    /// `take_token`
    TakeToken,
    /// `delete_token`
    DeleteToken,
    /// `delete_clearance`
    DeleteClearance,
}

/// Store wrapper with per-call stalls and failures.
#[derive(Debug, Clone)]
pub struct FaultyStore<S> {
    inner: S,
    delay: Duration,
    stalled: Arc<[StoreCall]>,
    failing: Arc<[StoreCall]>,
}

impl<S> FaultyStore<S> {
    /// Wrap `inner` with no faults.
    pub fn new(inner: S) -> Self {
        Self { inner, delay: Duration::ZERO, stalled: Arc::new([]), failing: Arc::new([]) }
    }

    /// Stall every call in `calls` by `delay`.
    #[must_use]
    pub fn stall(mut self, delay: Duration, calls: &[StoreCall]) -> Self {
        self.delay = delay;
        self.stalled = calls.into();
        self
    }

    /// Fail every call in `calls`.
    #[must_use]
    pub fn fail(mut self, calls: &[StoreCall]) -> Self {
        self.failing = calls.into();
        self
    }

    /// Underlying store, for inspection without faults.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn inject(&self, call: StoreCall) -> Result<(), StorageError> {
        if self.stalled.contains(&call) {
            thread::sleep(self.delay);
        }
        if self.failing.contains(&call) {
            return Err(StorageError::Io(format!("injected failure in {call:?}")));
        }
        Ok(())
    }
}

impl<S: DropStore> DropStore for FaultyStore<S> {
    fn insert_drop(&self, record: &DropRecord) -> Result<bool, StorageError> {
        self.inject(StoreCall::InsertDrop)?;
        self.inner.insert_drop(record)
    }

    fn load_drop(&self, id: DropId) -> Result<Option<DropRecord>, StorageError> {
        self.inject(StoreCall::LoadDrop)?;
        self.inner.load_drop(id)
    }

    fn delete_drop(&self, id: DropId) -> Result<bool, StorageError> {
        self.inject(StoreCall::DeleteDrop)?;
        self.inner.delete_drop(id)
    }

    fn list_drops(&self) -> Result<Vec<DropId>, StorageError> {
        self.inject(StoreCall::ListDrops)?;
        self.inner.list_drops()
    }

    fn increment_counter(
        &self,
        id: DropId,
        counter: Counter,
    ) -> Result<Option<u64>, StorageError> {
        self.inject(StoreCall::IncrementCounter)?;
        self.inner.increment_counter(id, counter)
    }

    fn put_token(&self, token: &AccessToken) -> Result<(), StorageError> {
        self.inject(StoreCall::PutToken)?;
        self.inner.put_token(token)
    }

    fn load_token(&self, token: &TokenValue) -> Result<Option<AccessToken>, StorageError> {
        self.inner.load_token(token)
    }

    fn take_token(
        &self,
        token: &TokenValue,
        drop_id: DropId,
    ) -> Result<Option<AccessToken>, StorageError> {
        self.inject(StoreCall::TakeToken)?;
        self.inner.take_token(token, drop_id)
    }

    fn delete_token(&self, token: &TokenValue) -> Result<bool, StorageError> {
        self.inject(StoreCall::DeleteToken)?;
        self.inner.delete_token(token)
    }

    fn list_tokens(&self) -> Result<Vec<AccessToken>, StorageError> {
        self.inner.list_tokens()
    }

    fn put_clearance(&self, clearance: &Clearance) -> Result<(), StorageError> {
        self.inner.put_clearance(clearance)
    }

    fn load_clearance(
        &self,
        drop_id: DropId,
        session: SessionId,
    ) -> Result<Option<Clearance>, StorageError> {
        self.inner.load_clearance(drop_id, session)
    }

    fn delete_clearance(
        &self,
        drop_id: DropId,
        session: SessionId,
    ) -> Result<bool, StorageError> {
        self.inject(StoreCall::DeleteClearance)?;
        self.inner.delete_clearance(drop_id, session)
    }

    fn delete_clearances(&self, drop_id: DropId) -> Result<usize, StorageError> {
        self.inner.delete_clearances(drop_id)
    }

    fn list_clearances(&self) -> Result<Vec<Clearance>, StorageError> {
        self.inner.list_clearances()
    }
}
