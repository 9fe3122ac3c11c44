//! obdagate storage
//!
//! The instantiated mapping document is a single current artifact: no history,
//! last write wins. `MappingStore` makes that safe to share:
//!
//! - writes to the same document are serialized through a per-path lock that
//!   every store handle for that path shares (`write_lock_for`, also used by
//!   other single-file stores such as the gate's level store);
//! - each write is an atomic replace (`persist::write_atomic`), so readers
//!   never observe a half-written document.

pub mod persist;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use thiserror::Error;

pub use persist::{read_optional, write_atomic};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

type LockRegistry = Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>;

fn lock_registry() -> &'static LockRegistry {
    static REGISTRY: OnceLock<LockRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Stable identity for a document path, whether or not the file exists yet.
///
/// Relative paths are anchored at the working directory. The deepest existing
/// ancestor is canonicalized and the missing tail re-joined, so the key does
/// not change once the file or its directories are created.
pub(crate) fn document_key(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };
    for ancestor in absolute.ancestors() {
        let Ok(canonical) = ancestor.canonicalize() else {
            continue;
        };
        return match absolute.strip_prefix(ancestor) {
            Ok(rest) if rest.as_os_str().is_empty() => canonical,
            Ok(rest) => canonical.join(rest),
            Err(_) => absolute.clone(),
        };
    }
    absolute
}

/// Write lock shared by every handle on `path` in this process.
///
/// Anything that replaces a file under this crate's persistence should hold
/// it across its read-modify-write, not just the final rename.
pub fn write_lock_for(path: &Path) -> Arc<Mutex<()>> {
    lock_registry()
        .lock()
        .entry(document_key(path))
        .or_default()
        .clone()
}

/// Handle on one persisted mapping document.
#[derive(Debug, Clone)]
pub struct MappingStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl MappingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock = write_lock_for(&path);
        Self { path, lock }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document text; `None` if nothing has been written yet.
    pub fn read_current(&self) -> Result<Option<String>, StorageError> {
        read_optional(&self.path).map_err(|source| StorageError::Read {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the current document with `text`.
    pub fn replace(&self, text: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        write_atomic(&self.path, text.as_bytes()).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!(path = %self.path.display(), bytes = text.len(), "mapping document replaced");
        Ok(())
    }

    pub(crate) fn shares_lock_with(&self, other: &MappingStore) -> bool {
        Arc::ptr_eq(&self.lock, &other.lock)
    }
}
