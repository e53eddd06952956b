//! Fragment vault
//!
//! A viewer who opens the primary link holds `k1` and has to come back with
//! the secondary link. The vault turns that into an explicit resumable
//! session: the first fragment is persisted under the drop id with a deadline,
//! and [`FragmentVault::complete`] consumes it together with the second.
//!
//! # Invariants
//!
//! - At most one held fragment per drop; holding again replaces it
//! - A held fragment past its deadline is never returned and is removed when
//!   seen
//! - Completing a session removes it whether or not the fragments open
//!   anything, since a wrong pair cannot be detected before decryption

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use vanish_core::{DropError, Environment, StorageError, model::DropId};
use vanish_crypto::{KeyMaterial, combine};
use zeroize::Zeroizing;

use crate::{ClientError, links::FragmentSlot};

/// Default lifetime of a held fragment.
pub const DEFAULT_FRAGMENT_TTL: Duration = Duration::from_secs(30 * 60);

/// Default byte quota of the bundled backends.
pub const DEFAULT_VAULT_QUOTA: usize = 64 * 1024;

/// Persistent key-value storage for held fragments.
///
/// Entries are opaque bytes keyed by drop id. Implementations enforce their
/// own capacity and report a full store as [`DropError::QuotaExceeded`].
pub trait VaultBackend: Clone + Send + Sync + 'static {
    /// Bytes stored for `drop_id`, if any.
    fn load(&self, drop_id: DropId) -> Result<Option<Zeroizing<Vec<u8>>>, DropError>;

    /// Store or replace the entry for `drop_id`.
    ///
    /// # Errors
    ///
    /// - `QuotaExceeded`: the entry does not fit
    fn store(&self, drop_id: DropId, bytes: &[u8]) -> Result<(), DropError>;

    /// Remove the entry for `drop_id`. Removing a missing entry succeeds.
    fn remove(&self, drop_id: DropId) -> Result<(), DropError>;

    /// Every drop id with an entry.
    fn list(&self) -> Result<Vec<DropId>, DropError>;
}

#[derive(Serialize, Deserialize)]
struct HeldFragment {
    slot: FragmentSlot,
    key: KeyMaterial,
    expires_at_ms: u64,
}

/// Resumable fragment sessions over a [`VaultBackend`].
#[derive(Debug, Clone)]
pub struct FragmentVault<E: Environment, B: VaultBackend> {
    env: E,
    backend: B,
    ttl: Duration,
}

impl<E: Environment, B: VaultBackend> FragmentVault<E, B> {
    /// Vault holding fragments for [`DEFAULT_FRAGMENT_TTL`].
    pub fn new(env: E, backend: B) -> Self {
        Self::with_ttl(env, backend, DEFAULT_FRAGMENT_TTL)
    }

    /// Vault holding fragments for `ttl`.
    pub fn with_ttl(env: E, backend: B, ttl: Duration) -> Self {
        Self { env, backend, ttl }
    }

    /// Backend handle.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Hold the first fragment seen for `drop_id`. Returns its deadline.
    ///
    /// # Errors
    ///
    /// - `QuotaExceeded`: the backend is full
    /// - `Storage`: the backend failed
    pub fn hold(&self, drop_id: DropId, slot: FragmentSlot, key: &KeyMaterial) -> Result<u64, ClientError> {
        let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
        let expires_at_ms = self.env.wall_clock_millis().saturating_add(ttl_ms);
        let entry = HeldFragment { slot, key: key.clone(), expires_at_ms };

        let mut bytes = Zeroizing::new(Vec::new());
        ciborium::into_writer(&entry, &mut *bytes)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.backend.store(drop_id, &bytes)?;

        tracing::debug!(%drop_id, %slot, expires_at_ms, "holding key fragment");
        Ok(expires_at_ms)
    }

    /// Slot of the live fragment held for `drop_id`, if any.
    pub fn pending(&self, drop_id: DropId) -> Result<Option<FragmentSlot>, ClientError> {
        Ok(self.live(drop_id)?.map(|held| held.slot))
    }

    /// Combine the held fragment with `second` and end the session.
    ///
    /// The halves are combined in `k1`, `k2` order whichever arrived first.
    ///
    /// # Errors
    ///
    /// - `NothingPending`: no live fragment held for `drop_id`
    /// - `SameFragment`: `second` is the half already held; the session is
    ///   kept
    pub fn complete(
        &self,
        drop_id: DropId,
        slot: FragmentSlot,
        second: &KeyMaterial,
    ) -> Result<KeyMaterial, ClientError> {
        let held = self.live(drop_id)?.ok_or(ClientError::NothingPending)?;
        if held.slot == slot {
            return Err(ClientError::SameFragment { slot });
        }

        self.backend.remove(drop_id)?;
        let master = match held.slot {
            FragmentSlot::First => combine(&held.key, second),
            FragmentSlot::Second => combine(second, &held.key),
        };

        tracing::debug!(%drop_id, "fragment session completed");
        Ok(master)
    }

    /// Drop the session for `drop_id`.
    pub fn forget(&self, drop_id: DropId) -> Result<(), ClientError> {
        Ok(self.backend.remove(drop_id)?)
    }

    /// Remove every held fragment past its deadline. Returns how many went.
    ///
    /// Unreadable entries are removed as well.
    pub fn purge_expired(&self) -> Result<usize, ClientError> {
        let mut removed = 0;
        for drop_id in self.backend.list()? {
            let keep = match self.read(drop_id) {
                Ok(Some(held)) => held.expires_at_ms >= self.env.wall_clock_millis(),
                Ok(None) => continue,
                Err(_) => false,
            };
            if !keep {
                self.backend.remove(drop_id)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn live(&self, drop_id: DropId) -> Result<Option<HeldFragment>, ClientError> {
        let held = match self.read(drop_id) {
            Ok(held) => held,
            Err(ClientError::Drop(DropError::Storage(StorageError::Serialization(reason)))) => {
                tracing::warn!(%drop_id, %reason, "discarding unreadable fragment");
                self.backend.remove(drop_id)?;
                return Ok(None);
            },
            Err(err) => return Err(err),
        };

        match held {
            Some(held) if held.expires_at_ms < self.env.wall_clock_millis() => {
                self.backend.remove(drop_id)?;
                Ok(None)
            },
            held => Ok(held),
        }
    }

    fn read(&self, drop_id: DropId) -> Result<Option<HeldFragment>, ClientError> {
        let Some(bytes) = self.backend.load(drop_id)? else {
            return Ok(None);
        };
        let held: HeldFragment = ciborium::from_reader(bytes.as_slice())
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(Some(held))
    }
}

/// In-memory backend with a byte quota.
#[derive(Clone)]
pub struct MemoryVaultBackend {
    entries: Arc<Mutex<HashMap<DropId, Zeroizing<Vec<u8>>>>>,
    quota: usize,
}

impl MemoryVaultBackend {
    /// Backend capped at [`DEFAULT_VAULT_QUOTA`] bytes.
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_VAULT_QUOTA)
    }

    /// Backend capped at `quota` bytes across all entries.
    pub fn with_quota(quota: usize) -> Self {
        Self { entries: Arc::new(Mutex::new(HashMap::new())), quota }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the backend holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<DropId, Zeroizing<Vec<u8>>>>, DropError> {
        self.entries.lock().map_err(|_| StorageError::Io("vault lock poisoned".into()).into())
    }
}

impl std::fmt::Debug for MemoryVaultBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryVaultBackend")
            .field("entries", &self.len())
            .field("quota", &self.quota)
            .finish()
    }
}

impl Default for MemoryVaultBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl VaultBackend for MemoryVaultBackend {
    fn load(&self, drop_id: DropId) -> Result<Option<Zeroizing<Vec<u8>>>, DropError> {
        Ok(self.entries()?.get(&drop_id).cloned())
    }

    fn store(&self, drop_id: DropId, bytes: &[u8]) -> Result<(), DropError> {
        let mut entries = self.entries()?;
        let used: usize =
            entries.iter().filter(|(id, _)| **id != drop_id).map(|(_, bytes)| bytes.len()).sum();
        if used + bytes.len() > self.quota {
            return Err(DropError::QuotaExceeded);
        }
        entries.insert(drop_id, Zeroizing::new(bytes.to_vec()));
        Ok(())
    }

    fn remove(&self, drop_id: DropId) -> Result<(), DropError> {
        self.entries()?.remove(&drop_id);
        Ok(())
    }

    fn list(&self) -> Result<Vec<DropId>, DropError> {
        Ok(self.entries()?.keys().copied().collect())
    }
}

/// Extension of entry files.
const ENTRY_EXTENSION: &str = "frag";

/// One file per drop under a directory, with a byte quota.
#[derive(Debug, Clone)]
pub struct FileVaultBackend {
    dir: Arc<PathBuf>,
    quota: usize,
}

impl FileVaultBackend {
    /// Open or create a vault directory capped at `quota` bytes.
    pub fn open(dir: impl AsRef<Path>, quota: usize) -> Result<Self, DropError> {
        fs::create_dir_all(dir.as_ref()).map_err(StorageError::from)?;
        Ok(Self { dir: Arc::new(dir.as_ref().to_path_buf()), quota })
    }

    /// Vault directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, drop_id: DropId) -> PathBuf {
        self.dir.join(format!("{drop_id}.{ENTRY_EXTENSION}"))
    }

    fn entries(&self) -> Result<Vec<(DropId, u64)>, DropError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.dir.as_path()).map_err(StorageError::from)? {
            let entry = entry.map_err(StorageError::from)?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let Some(drop_id) =
                path.file_stem().and_then(|stem| stem.to_str()).and_then(|stem| stem.parse().ok())
            else {
                continue;
            };
            let size = entry.metadata().map_err(StorageError::from)?.len();
            entries.push((drop_id, size));
        }
        Ok(entries)
    }
}

impl VaultBackend for FileVaultBackend {
    fn load(&self, drop_id: DropId) -> Result<Option<Zeroizing<Vec<u8>>>, DropError> {
        match fs::read(self.path(drop_id)) {
            Ok(bytes) => Ok(Some(Zeroizing::new(bytes))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::from(err).into()),
        }
    }

    fn store(&self, drop_id: DropId, bytes: &[u8]) -> Result<(), DropError> {
        let used: u64 =
            self.entries()?.iter().filter(|(id, _)| *id != drop_id).map(|(_, size)| *size).sum();
        let needed = used.saturating_add(bytes.len() as u64);
        if needed > self.quota as u64 {
            return Err(DropError::QuotaExceeded);
        }

        let path = self.path(drop_id);
        let partial = path.with_extension("partial");
        fs::write(&partial, bytes).map_err(StorageError::from)?;
        fs::rename(&partial, &path).map_err(StorageError::from)?;
        Ok(())
    }

    fn remove(&self, drop_id: DropId) -> Result<(), DropError> {
        match fs::remove_file(self.path(drop_id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::from(err).into()),
        }
    }

    fn list(&self) -> Result<Vec<DropId>, DropError> {
        Ok(self.entries()?.into_iter().map(|(id, _)| id).collect())
    }
}
