//! # Store Locking
//!
//! Concurrent resolutions share one artifact store, so readers and writers of
//! the same `group~artifact~version` slice coordinate through two layers: an
//! in-process [`RwLock`] per key, and an advisory file lock under the store's
//! `.locks` directory for other processes.
//!
//! Batches of keys are always acquired in sorted order, which rules out
//! deadlock between overlapping batches. The file layer fails open: when a
//! lock file cannot be created or locked, the operation proceeds with a
//! warning rather than aborting, relying on store writes being idempotent.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fs2::FileExt;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::{Coordinate, LOCK_DIR};

//================================================================================================
// Types
//================================================================================================

/// The access mode a batch of keys is taken under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Multiple readers of the same keys may proceed together.
    Shared,
    /// Excludes every other holder of the same keys.
    Exclusive,
}

/// Hands out per-key locks over the shared artifact store.
pub struct LockManager {
    dir: PathBuf,
    entries: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

/// Holds a batch of acquired locks until dropped.
///
/// File locks release before their in-process guards, so another process
/// never observes the key file free while this process still holds it.
pub struct LockBatch {
    files: Vec<File>,
    guards: Vec<Guard>,
}

enum Guard {
    Shared(OwnedRwLockReadGuard<()>),
    Exclusive(OwnedRwLockWriteGuard<()>),
}

//================================================================================================
// Impls
//================================================================================================

impl LockManager {
    /// Creates a manager whose lock files live under the store root.
    pub fn new(store_root: impl Into<PathBuf>) -> Self {
        Self {
            dir: store_root.into().join(LOCK_DIR),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires every coordinate's key under the given access mode, waiting
    /// for current holders as needed.
    pub async fn acquire<'a>(
        &self,
        coordinates: impl IntoIterator<Item = &'a Coordinate>,
        access: Access,
    ) -> LockBatch {
        // sorted, deduplicated keys make overlapping batches deadlock-free
        let keys: BTreeSet<String> = coordinates.into_iter().map(Coordinate::lock_key).collect();

        let mut batch = LockBatch {
            files: Vec::with_capacity(keys.len()),
            guards: Vec::with_capacity(keys.len()),
        };

        for key in keys {
            let entry = {
                let mut entries = self
                    .entries
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                entries.entry(key.clone()).or_default().clone()
            };

            let guard = match access {
                Access::Shared => Guard::Shared(entry.read_owned().await),
                Access::Exclusive => Guard::Exclusive(entry.write_owned().await),
            };
            batch.guards.push(guard);

            if let Some(file) = self.lock_file(&key, access).await {
                batch.files.push(file);
            }
        }

        batch
    }

    /// Takes the advisory file lock for one key, failing open on any error.
    async fn lock_file(&self, key: &str, access: Access) -> Option<File> {
        let path = self.dir.join(format!("{key}.lock"));

        let open = std::fs::create_dir_all(&self.dir)
            .and_then(|_| File::options().create(true).write(true).open(&path));
        let file = match open {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(key, error = %e, "proceeding without advisory file lock");
                return None;
            },
        };

        let locked = tokio::task::spawn_blocking(move || {
            match access {
                Access::Shared => file.lock_shared()?,
                Access::Exclusive => file.lock_exclusive()?,
            }
            Ok::<_, std::io::Error>(file)
        })
        .await;

        match locked {
            Ok(Ok(file)) => Some(file),
            Ok(Err(e)) => {
                tracing::warn!(key, error = %e, "proceeding without advisory file lock");
                None
            },
            Err(e) => {
                tracing::warn!(key, error = %e, "lock task failed, proceeding without advisory file lock");
                None
            },
        }
    }
}

impl LockBatch {
    /// How many advisory file locks the batch actually holds.
    pub fn file_locks(&self) -> usize {
        self.files.len()
    }
}
