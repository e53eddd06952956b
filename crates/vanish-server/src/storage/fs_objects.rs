//! Filesystem object store.
//!
//! Each blob is one file under a root directory, at the path spelled by its
//! storage key (`drops/<id>/<index>`). Writes go to a sibling temp file and
//! are renamed into place, so a reader never sees a half-written blob.

use std::{
    fs,
    io::ErrorKind,
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use vanish_core::{
    StorageError,
    storage::{ObjectStore, PointerSigner},
};

/// [`ObjectStore`] on the local filesystem.
///
/// Clone is cheap (Arc).
#[derive(Clone)]
pub struct FsObjectStore {
    root: Arc<PathBuf>,
    signer: PointerSigner,
}

impl FsObjectStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the root directory cannot be created.
    pub fn open(root: impl AsRef<Path>, signer: PointerSigner) -> Result<Self, StorageError> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self { root: Arc::new(root.as_ref().to_path_buf()), signer })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a storage key to a path strictly inside the root.
    fn path(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let plain = !key.is_empty()
            && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(StorageError::Corrupted(format!("unusable object key {key:?}")));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let staging = path.with_extension("partial");
        fs::write(&staging, bytes)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(self.path(key)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, keys: &[String]) -> Result<(), StorageError> {
        for key in keys {
            let path = self.path(key)?;
            match fs::remove_file(&path) {
                Ok(()) => {},
                Err(e) if e.kind() == ErrorKind::NotFound => {},
                Err(e) => return Err(e.into()),
            }

            // Empty per-drop directories are dropped along with their last blob.
            if let Some(parent) = path.parent().filter(|p| *p != self.root.as_path()) {
                let _ = fs::remove_dir(parent);
            }
        }
        Ok(())
    }

    fn create_temporary_url(&self, key: &str, expires_at_ms: u64) -> Result<String, StorageError> {
        self.path(key)?;
        Ok(self.signer.url(key, expires_at_ms))
    }

    fn verify_temporary_url(&self, key: &str, expires_at_ms: u64, signature: &str) -> bool {
        self.signer.verify(key, expires_at_ms, signature)
    }
}
