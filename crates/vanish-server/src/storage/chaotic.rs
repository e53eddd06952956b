//! Fault injection for storage backends
//!
//! [`ChaoticStore`] wraps a [`DropStore`] or an [`ObjectStore`] and fails a
//! seeded fraction of calls with a transient `StorageError::Io`, so chaos
//! tests exercise the service's bounded retries and its all-or-nothing
//! creation. A failing call never reaches the inner store, so injected
//! failures leave no partial writes behind.

use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use vanish_core::{
    StorageError,
    model::{AccessToken, Clearance, Counter, DropId, DropRecord, SessionId, TokenValue},
    storage::{DropStore, ObjectStore},
};

/// Seed used by [`ChaoticStore::new`].
const DEFAULT_SEED: u64 = 0x1234_5678_9ABC_DEF0;

/// Storage wrapper that fails a fixed fraction of calls.
///
/// Clones share the RNG and the call counter, so a service holding several
/// clones still sees one reproducible failure sequence per seed.
#[derive(Clone)]
pub struct ChaoticStore<S> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: Arc<AtomicU64>,
    calls: Arc<AtomicUsize>,
}

/// One step of the Numerical Recipes LCG, modulo 2^32.
fn lcg_step(state: u64) -> u64 {
    const A: u64 = 1_664_525;
    const C: u64 = 1_013_904_223;
    A.wrapping_mul(state).wrapping_add(C) % (1u64 << 32)
}

impl<S> ChaoticStore<S> {
    /// Wrap `inner` with the default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, DEFAULT_SEED)
    }

    /// Wrap `inner` with an explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(AtomicU64::new(seed)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Underlying store, for checking invariants after chaos.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Calls attempted so far, failed ones included.
    pub fn operation_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    /// Next sample in [0.0, 1.0).
    fn sample(&self) -> f64 {
        let previous = self
            .rng
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |state| Some(lcg_step(state)))
            .unwrap_or_else(|state| state);
        lcg_step(previous) as f64 / (1u64 << 32) as f64
    }

    /// Count the call and decide whether it fails.
    fn roll(&self) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if self.sample() < self.failure_rate {
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: DropStore> DropStore for ChaoticStore<S> {
    fn insert_drop(&self, record: &DropRecord) -> Result<bool, StorageError> {
        self.roll()?;
        self.inner.insert_drop(record)
    }

    fn load_drop(&self, id: DropId) -> Result<Option<DropRecord>, StorageError> {
        self.roll()?;
        self.inner.load_drop(id)
    }

    fn delete_drop(&self, id: DropId) -> Result<bool, StorageError> {
        self.roll()?;
        self.inner.delete_drop(id)
    }

    fn list_drops(&self) -> Result<Vec<DropId>, StorageError> {
        self.roll()?;
        self.inner.list_drops()
    }

    fn increment_counter(
        &self,
        id: DropId,
        counter: Counter,
    ) -> Result<Option<u64>, StorageError> {
        self.roll()?;
        self.inner.increment_counter(id, counter)
    }

    fn put_token(&self, token: &AccessToken) -> Result<(), StorageError> {
        self.roll()?;
        self.inner.put_token(token)
    }

    fn load_token(&self, token: &TokenValue) -> Result<Option<AccessToken>, StorageError> {
        self.roll()?;
        self.inner.load_token(token)
    }

    fn take_token(
        &self,
        token: &TokenValue,
        drop_id: DropId,
    ) -> Result<Option<AccessToken>, StorageError> {
        self.roll()?;
        self.inner.take_token(token, drop_id)
    }

    fn delete_token(&self, token: &TokenValue) -> Result<bool, StorageError> {
        self.roll()?;
        self.inner.delete_token(token)
    }

    fn list_tokens(&self) -> Result<Vec<AccessToken>, StorageError> {
        self.roll()?;
        self.inner.list_tokens()
    }

    fn put_clearance(&self, clearance: &Clearance) -> Result<(), StorageError> {
        self.roll()?;
        self.inner.put_clearance(clearance)
    }

    fn load_clearance(
        &self,
        drop_id: DropId,
        session: SessionId,
    ) -> Result<Option<Clearance>, StorageError> {
        self.roll()?;
        self.inner.load_clearance(drop_id, session)
    }

    fn delete_clearance(&self, drop_id: DropId, session: SessionId) -> Result<bool, StorageError> {
        self.roll()?;
        self.inner.delete_clearance(drop_id, session)
    }

    fn delete_clearances(&self, drop_id: DropId) -> Result<usize, StorageError> {
        self.roll()?;
        self.inner.delete_clearances(drop_id)
    }

    fn list_clearances(&self) -> Result<Vec<Clearance>, StorageError> {
        self.roll()?;
        self.inner.list_clearances()
    }
}

impl<S: ObjectStore> ObjectStore for ChaoticStore<S> {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.roll()?;
        self.inner.put(key, bytes)
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.roll()?;
        self.inner.get(key)
    }

    fn delete(&self, keys: &[String]) -> Result<(), StorageError> {
        self.roll()?;
        self.inner.delete(keys)
    }

    fn create_temporary_url(&self, key: &str, expires_at_ms: u64) -> Result<String, StorageError> {
        self.roll()?;
        self.inner.create_temporary_url(key, expires_at_ms)
    }

    fn verify_temporary_url(&self, key: &str, expires_at_ms: u64, signature: &str) -> bool {
        self.inner.verify_temporary_url(key, expires_at_ms, signature)
    }
}

#[cfg(test)]
mod tests {
    use vanish_core::storage::MemoryDropStore;

    use super::*;

    #[test]
    fn zero_rate_never_fails() {
        let store = ChaoticStore::with_seed(MemoryDropStore::new(), 0.0, 9);
        for _ in 0..100 {
            assert!(store.list_drops().is_ok());
        }
        assert_eq!(store.operation_count(), 100);
    }

    #[test]
    fn full_rate_always_fails_transiently() {
        let store = ChaoticStore::with_seed(MemoryDropStore::new(), 1.0, 9);
        let err = store.list_drops().unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn same_seed_same_failures() {
        let a = ChaoticStore::with_seed(MemoryDropStore::new(), 0.5, 77);
        let b = ChaoticStore::with_seed(MemoryDropStore::new(), 0.5, 77);

        let pattern_a: Vec<bool> = (0..50).map(|_| a.list_drops().is_ok()).collect();
        let pattern_b: Vec<bool> = (0..50).map(|_| b.list_drops().is_ok()).collect();
        assert_eq!(pattern_a, pattern_b);
    }

    #[test]
    #[should_panic(expected = "failure_rate must be between 0.0 and 1.0")]
    fn rejects_rate_above_one() {
        let _ = ChaoticStore::new(MemoryDropStore::new(), 1.5);
    }
}
