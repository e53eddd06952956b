//! Redb-backed durable drop store.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. Drops,
//! tokens and clearances all survive server restarts. Every read-modify-write
//! (token redemption, counter increments, insert-if-absent) runs inside one
//! write transaction, which Redb serializes.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Serialize, de::DeserializeOwned};
use vanish_core::{
    StorageError,
    model::{AccessToken, Clearance, Counter, DropId, DropRecord, SessionId, TokenValue},
    storage::DropStore,
};

/// Every table maps raw byte keys to raw byte values.
type BytesTable = TableDefinition<'static, &'static [u8], &'static [u8]>;

/// Table: drops
/// Key: drop_id as big-endian bytes [16 bytes]
/// Value: CBOR-encoded DropRecord
const DROPS: BytesTable = TableDefinition::new("drops");

/// Table: tokens
/// Key: token value [32 bytes]
/// Value: CBOR-encoded AccessToken
const TOKENS: BytesTable = TableDefinition::new("tokens");

/// Table: clearances
/// Key: (drop_id: u128, session: u128) as big-endian bytes [32 bytes]
/// Value: CBOR-encoded Clearance
const CLEARANCES: BytesTable = TableDefinition::new("clearances");

/// Durable drop store backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbDropStore {
    db: Arc<Database>,
}

impl RedbDropStore {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist (DROPS, TOKENS, CLEARANCES).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(|e| StorageError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(DROPS).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(TOKENS).map_err(|e| StorageError::Io(e.to_string()))?;
            let _ = txn.open_table(CLEARANCES).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Read and decode one value.
    fn read<T: DeserializeOwned>(
        &self,
        table: BytesTable,
        key: &[u8],
    ) -> Result<Option<T>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(table).map_err(|e| StorageError::Io(e.to_string()))?;

        match table.get(key).map_err(|e| StorageError::Io(e.to_string()))? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Decode every value of a table.
    fn read_all<T: DeserializeOwned>(
        &self,
        table: BytesTable,
    ) -> Result<Vec<T>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(table).map_err(|e| StorageError::Io(e.to_string()))?;

        let mut values = Vec::new();
        for entry in table.iter().map_err(|e| StorageError::Io(e.to_string()))? {
            let (_, value) = entry.map_err(|e| StorageError::Io(e.to_string()))?;
            values.push(decode(value.value())?);
        }
        Ok(values)
    }

    /// Encode and insert one value, overwriting.
    fn write<T: Serialize>(
        &self,
        table: BytesTable,
        key: &[u8],
        value: &T,
    ) -> Result<(), StorageError> {
        let bytes = encode(value)?;
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(table).map_err(|e| StorageError::Io(e.to_string()))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(())
    }

    /// Remove one key. Returns whether it existed.
    fn remove(
        &self,
        table: BytesTable,
        key: &[u8],
    ) -> Result<bool, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        let removed = {
            let mut table = txn.open_table(table).map_err(|e| StorageError::Io(e.to_string()))?;
            table.remove(key).map_err(|e| StorageError::Io(e.to_string()))?.is_some()
        };
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;
        Ok(removed)
    }
}

impl DropStore for RedbDropStore {
    fn insert_drop(&self, record: &DropRecord) -> Result<bool, StorageError> {
        let key = encode_drop_key(record.id);
        let bytes = encode(record)?;

        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        let inserted = {
            let mut table = txn.open_table(DROPS).map_err(|e| StorageError::Io(e.to_string()))?;
            let exists =
                table.get(key.as_slice()).map_err(|e| StorageError::Io(e.to_string()))?.is_some();
            if !exists {
                table
                    .insert(key.as_slice(), bytes.as_slice())
                    .map_err(|e| StorageError::Io(e.to_string()))?;
            }
            !exists
        };
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(inserted)
    }

    fn load_drop(&self, id: DropId) -> Result<Option<DropRecord>, StorageError> {
        self.read(DROPS, &encode_drop_key(id))
    }

    fn delete_drop(&self, id: DropId) -> Result<bool, StorageError> {
        self.remove(DROPS, &encode_drop_key(id))
    }

    fn list_drops(&self) -> Result<Vec<DropId>, StorageError> {
        let txn = self.db.begin_read().map_err(|e| StorageError::Io(e.to_string()))?;
        let table = txn.open_table(DROPS).map_err(|e| StorageError::Io(e.to_string()))?;

        let mut ids = Vec::new();
        for entry in table.iter().map_err(|e| StorageError::Io(e.to_string()))? {
            let (key, _) = entry.map_err(|e| StorageError::Io(e.to_string()))?;
            ids.push(decode_drop_key(key.value())?);
        }
        Ok(ids)
    }

    fn increment_counter(
        &self,
        id: DropId,
        counter: Counter,
    ) -> Result<Option<u64>, StorageError> {
        let key = encode_drop_key(id);

        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        let count = {
            let mut table = txn.open_table(DROPS).map_err(|e| StorageError::Io(e.to_string()))?;
            let current: Option<DropRecord> =
                match table.get(key.as_slice()).map_err(|e| StorageError::Io(e.to_string()))? {
                    Some(value) => Some(decode(value.value())?),
                    None => None,
                };

            match current {
                Some(mut record) => {
                    let count = record.count_mut(counter);
                    *count = count.saturating_add(1);
                    let updated = *count;

                    let bytes = encode(&record)?;
                    table
                        .insert(key.as_slice(), bytes.as_slice())
                        .map_err(|e| StorageError::Io(e.to_string()))?;
                    Some(updated)
                },
                None => None,
            }
        };
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(count)
    }

    fn put_token(&self, token: &AccessToken) -> Result<(), StorageError> {
        self.write(TOKENS, token.token.as_bytes(), token)
    }

    fn load_token(&self, token: &TokenValue) -> Result<Option<AccessToken>, StorageError> {
        self.read(TOKENS, token.as_bytes())
    }

    fn take_token(
        &self,
        token: &TokenValue,
        drop_id: DropId,
    ) -> Result<Option<AccessToken>, StorageError> {
        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        let taken = {
            let mut table = txn.open_table(TOKENS).map_err(|e| StorageError::Io(e.to_string()))?;
            let key = token.as_bytes().as_slice();
            let stored: Option<AccessToken> =
                match table.get(key).map_err(|e| StorageError::Io(e.to_string()))? {
                    Some(value) => Some(decode(value.value())?),
                    None => None,
                };

            match stored {
                Some(stored) if stored.drop_id == drop_id => {
                    table.remove(key).map_err(|e| StorageError::Io(e.to_string()))?;
                    Some(stored)
                },
                _ => None,
            }
        };
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(taken)
    }

    fn delete_token(&self, token: &TokenValue) -> Result<bool, StorageError> {
        self.remove(TOKENS, token.as_bytes())
    }

    fn list_tokens(&self) -> Result<Vec<AccessToken>, StorageError> {
        self.read_all(TOKENS)
    }

    fn put_clearance(&self, clearance: &Clearance) -> Result<(), StorageError> {
        self.write(CLEARANCES, &encode_clearance_key(clearance.drop_id, clearance.session), clearance)
    }

    fn load_clearance(
        &self,
        drop_id: DropId,
        session: SessionId,
    ) -> Result<Option<Clearance>, StorageError> {
        self.read(CLEARANCES, &encode_clearance_key(drop_id, session))
    }

    fn delete_clearance(&self, drop_id: DropId, session: SessionId) -> Result<bool, StorageError> {
        self.remove(CLEARANCES, &encode_clearance_key(drop_id, session))
    }

    fn delete_clearances(&self, drop_id: DropId) -> Result<usize, StorageError> {
        let start = encode_clearance_key(drop_id, SessionId::from_u128(0));
        let end = encode_clearance_key(drop_id, SessionId::from_u128(u128::MAX));

        let txn = self.db.begin_write().map_err(|e| StorageError::Io(e.to_string()))?;
        let removed = {
            let mut table =
                txn.open_table(CLEARANCES).map_err(|e| StorageError::Io(e.to_string()))?;

            let mut keys = Vec::new();
            for entry in table
                .range(start.as_slice()..=end.as_slice())
                .map_err(|e| StorageError::Io(e.to_string()))?
            {
                let (key, _) = entry.map_err(|e| StorageError::Io(e.to_string()))?;
                keys.push(key.value().to_vec());
            }

            for key in &keys {
                table.remove(key.as_slice()).map_err(|e| StorageError::Io(e.to_string()))?;
            }
            keys.len()
        };
        txn.commit().map_err(|e| StorageError::Io(e.to_string()))?;

        Ok(removed)
    }

    fn list_clearances(&self) -> Result<Vec<Clearance>, StorageError> {
        self.read_all(CLEARANCES)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StorageError> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Encode drop key as big-endian bytes
fn encode_drop_key(id: DropId) -> [u8; 16] {
    id.as_u128().to_be_bytes()
}

/// Decode drop key from bytes
fn decode_drop_key(bytes: &[u8]) -> Result<DropId, StorageError> {
    let raw: [u8; 16] = bytes
        .try_into()
        .map_err(|_| StorageError::Corrupted(format!("drop key of {} bytes", bytes.len())))?;
    Ok(DropId::from_u128(u128::from_be_bytes(raw)))
}

/// Encode (drop_id, session) as big-endian bytes, so one drop's clearances
/// form a contiguous range
fn encode_clearance_key(drop_id: DropId, session: SessionId) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..16].copy_from_slice(&drop_id.as_u128().to_be_bytes());
    key[16..].copy_from_slice(&session.as_u128().to_be_bytes());
    key
}
