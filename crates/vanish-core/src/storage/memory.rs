//! In-memory backends
//!
//! Used by simulation, by tests and by the server when it runs without a data
//! directory. Nothing survives a restart.

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard},
};

use super::{DropStore, ObjectStore, PointerSigner};
use crate::{
    error::StorageError,
    model::{AccessToken, Clearance, Counter, DropId, DropRecord, SessionId, TokenValue},
};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex.lock().map_err(|_| StorageError::Corrupted("memory store lock poisoned".into()))
}

/// In-memory [`DropStore`].
///
/// All state sits behind one `Arc<Mutex<>>`, so clones share it and every
/// operation, including the read-modify-write ones, is atomic.
#[derive(Clone, Default)]
pub struct MemoryDropStore {
    inner: Arc<Mutex<MemoryDropStoreInner>>,
}

#[derive(Default)]
struct MemoryDropStoreInner {
    drops: HashMap<DropId, DropRecord>,
    tokens: HashMap<TokenValue, AccessToken>,
    clearances: HashMap<(DropId, SessionId), Clearance>,
}

impl MemoryDropStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored drops.
    pub fn drop_count(&self) -> usize {
        lock(&self.inner).map(|inner| inner.drops.len()).unwrap_or(0)
    }

    /// Number of outstanding tokens.
    pub fn token_count(&self) -> usize {
        lock(&self.inner).map(|inner| inner.tokens.len()).unwrap_or(0)
    }
}

impl DropStore for MemoryDropStore {
    fn insert_drop(&self, record: &DropRecord) -> Result<bool, StorageError> {
        let mut inner = lock(&self.inner)?;
        if inner.drops.contains_key(&record.id) {
            return Ok(false);
        }
        inner.drops.insert(record.id, record.clone());
        Ok(true)
    }

    fn load_drop(&self, id: DropId) -> Result<Option<DropRecord>, StorageError> {
        Ok(lock(&self.inner)?.drops.get(&id).cloned())
    }

    fn delete_drop(&self, id: DropId) -> Result<bool, StorageError> {
        Ok(lock(&self.inner)?.drops.remove(&id).is_some())
    }

    fn list_drops(&self) -> Result<Vec<DropId>, StorageError> {
        Ok(lock(&self.inner)?.drops.keys().copied().collect())
    }

    fn increment_counter(
        &self,
        id: DropId,
        counter: Counter,
    ) -> Result<Option<u64>, StorageError> {
        let mut inner = lock(&self.inner)?;
        Ok(inner.drops.get_mut(&id).map(|record| {
            let count = record.count_mut(counter);
            *count = count.saturating_add(1);
            *count
        }))
    }

    fn put_token(&self, token: &AccessToken) -> Result<(), StorageError> {
        lock(&self.inner)?.tokens.insert(token.token, token.clone());
        Ok(())
    }

    fn load_token(&self, token: &TokenValue) -> Result<Option<AccessToken>, StorageError> {
        Ok(lock(&self.inner)?.tokens.get(token).cloned())
    }

    fn take_token(
        &self,
        token: &TokenValue,
        drop_id: DropId,
    ) -> Result<Option<AccessToken>, StorageError> {
        let mut inner = lock(&self.inner)?;
        let matches = inner.tokens.get(token).is_some_and(|t| t.drop_id == drop_id);
        Ok(if matches { inner.tokens.remove(token) } else { None })
    }

    fn delete_token(&self, token: &TokenValue) -> Result<bool, StorageError> {
        Ok(lock(&self.inner)?.tokens.remove(token).is_some())
    }

    fn list_tokens(&self) -> Result<Vec<AccessToken>, StorageError> {
        Ok(lock(&self.inner)?.tokens.values().cloned().collect())
    }

    fn put_clearance(&self, clearance: &Clearance) -> Result<(), StorageError> {
        lock(&self.inner)?
            .clearances
            .insert((clearance.drop_id, clearance.session), clearance.clone());
        Ok(())
    }

    fn load_clearance(
        &self,
        drop_id: DropId,
        session: SessionId,
    ) -> Result<Option<Clearance>, StorageError> {
        Ok(lock(&self.inner)?.clearances.get(&(drop_id, session)).cloned())
    }

    fn delete_clearance(&self, drop_id: DropId, session: SessionId) -> Result<bool, StorageError> {
        Ok(lock(&self.inner)?.clearances.remove(&(drop_id, session)).is_some())
    }

    fn delete_clearances(&self, drop_id: DropId) -> Result<usize, StorageError> {
        let mut inner = lock(&self.inner)?;
        let before = inner.clearances.len();
        inner.clearances.retain(|(id, _), _| *id != drop_id);
        Ok(before - inner.clearances.len())
    }

    fn list_clearances(&self) -> Result<Vec<Clearance>, StorageError> {
        Ok(lock(&self.inner)?.clearances.values().cloned().collect())
    }
}

/// In-memory [`ObjectStore`] signing temporary URLs with a [`PointerSigner`].
#[derive(Clone)]
pub struct MemoryObjectStore {
    blobs: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    signer: PointerSigner,
}

impl MemoryObjectStore {
    /// Create an empty store.
    pub fn new(signer: PointerSigner) -> Self {
        Self { blobs: Arc::new(Mutex::new(BTreeMap::new())), signer }
    }

    /// Whether a blob is present.
    pub fn contains(&self, key: &str) -> bool {
        lock(&self.blobs).is_ok_and(|blobs| blobs.contains_key(key))
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        lock(&self.blobs).map(|blobs| blobs.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        lock(&self.blobs)?.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(lock(&self.blobs)?.get(key).cloned())
    }

    fn delete(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut blobs = lock(&self.blobs)?;
        for key in keys {
            blobs.remove(key);
        }
        Ok(())
    }

    fn create_temporary_url(&self, key: &str, expires_at_ms: u64) -> Result<String, StorageError> {
        Ok(self.signer.url(key, expires_at_ms))
    }

    fn verify_temporary_url(&self, key: &str, expires_at_ms: u64, signature: &str) -> bool {
        self.signer.verify(key, expires_at_ms, signature)
    }
}

#[cfg(test)]
mod tests {
    use vanish_crypto::{Envelope, POINTER_SECRET_SIZE};

    use super::*;
    use crate::model::{ExpiryPolicy, Payload, Protection};

    fn record(id: u128) -> DropRecord {
        DropRecord {
            id: DropId::from_u128(id),
            owner: None,
            payload: Payload::Text {
                body: Envelope { iv: [0; 12], salt: [0; 16], ciphertext: vec![0; 16] },
            },
            protection: Protection::Secure,
            expiry: ExpiryPolicy::Session,
            max_scans: None,
            max_downloads: None,
            scan_count: 0,
            download_count: 0,
            password_hash: None,
            created_at_ms: 0,
            expired_at_ms: None,
        }
    }

    fn token(byte: u8, drop_id: u128) -> AccessToken {
        AccessToken {
            token: TokenValue::from_bytes([byte; 32]),
            drop_id: DropId::from_u128(drop_id),
            expires_at_ms: 100,
        }
    }

    #[test]
    fn insert_never_overwrites() {
        let store = MemoryDropStore::new();
        assert!(store.insert_drop(&record(1)).unwrap());

        let mut changed = record(1);
        changed.scan_count = 9;
        assert!(!store.insert_drop(&changed).unwrap());
        assert_eq!(store.load_drop(DropId::from_u128(1)).unwrap().unwrap().scan_count, 0);
    }

    #[test]
    fn delete_is_idempotent() {
        let store = MemoryDropStore::new();
        store.insert_drop(&record(1)).unwrap();

        assert!(store.delete_drop(DropId::from_u128(1)).unwrap());
        assert!(!store.delete_drop(DropId::from_u128(1)).unwrap());
    }

    #[test]
    fn increment_missing_drop_is_none() {
        let store = MemoryDropStore::new();
        assert_eq!(store.increment_counter(DropId::from_u128(5), Counter::Scans).unwrap(), None);

        store.insert_drop(&record(5)).unwrap();
        assert_eq!(store.increment_counter(DropId::from_u128(5), Counter::Scans).unwrap(), Some(1));
        assert_eq!(
            store.increment_counter(DropId::from_u128(5), Counter::Downloads).unwrap(),
            Some(1)
        );
    }

    #[test]
    fn take_token_only_for_matching_drop() {
        let store = MemoryDropStore::new();
        let t = token(1, 10);
        store.put_token(&t).unwrap();

        assert_eq!(store.take_token(&t.token, DropId::from_u128(11)).unwrap(), None);
        assert_eq!(store.token_count(), 1);

        assert_eq!(store.take_token(&t.token, DropId::from_u128(10)).unwrap(), Some(t.clone()));
        assert_eq!(store.take_token(&t.token, DropId::from_u128(10)).unwrap(), None);
    }

    #[test]
    fn clearances_deleted_per_drop() {
        let store = MemoryDropStore::new();
        for (drop_id, session) in [(1, 1), (1, 2), (2, 1)] {
            store
                .put_clearance(&Clearance {
                    drop_id: DropId::from_u128(drop_id),
                    session: SessionId::from_u128(session),
                    expires_at_ms: 10,
                })
                .unwrap();
        }

        assert_eq!(store.delete_clearances(DropId::from_u128(1)).unwrap(), 2);
        assert_eq!(store.list_clearances().unwrap().len(), 1);
    }

    #[test]
    fn object_delete_ignores_missing_keys() {
        let objects = MemoryObjectStore::new(PointerSigner::new("http://x", [0; POINTER_SECRET_SIZE]));
        objects.put("a", b"1").unwrap();

        objects.delete(&["a".to_string(), "missing".to_string()]).unwrap();
        assert!(objects.is_empty());
    }
}
