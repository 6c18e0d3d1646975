//! The single-writer transactional store: rooms, members, strokes,
//! objects, turns, and audit logs.
//!
//! A global mutex serializes transactions one at a time. Each
//! transaction works against a private copy of the committed state;
//! mutations are buffered there and only merged back into the shared
//! state if the transaction body returns `Ok`. A failed transaction
//! leaves the store untouched.

mod snapshot;
mod transaction;

pub use snapshot::Snapshot;
pub use transaction::Transaction;

use std::path::PathBuf;

use dr_domain::model::{AuditLog, CanvasObject, Room, RoomMember, Stroke, Turn};
use dr_domain::Result;
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub(crate) struct StoreInner {
    pub(crate) rooms: std::collections::HashMap<Uuid, Room>,
    pub(crate) members: std::collections::HashMap<(Uuid, Uuid), RoomMember>,
    pub(crate) strokes: std::collections::HashMap<Uuid, Stroke>,
    pub(crate) objects: std::collections::HashMap<Uuid, CanvasObject>,
    pub(crate) turns: std::collections::HashMap<Uuid, Turn>,
    pub(crate) audit_logs: Vec<AuditLog>,
}

pub struct Store {
    inner: Mutex<StoreInner>,
    snapshot_path: Option<PathBuf>,
    snapshot_on_commit: bool,
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            snapshot_path: None,
            snapshot_on_commit: false,
        }
    }

    /// Build a store that persists a JSON snapshot to `path` after
    /// every transaction that changed something, reloading from it
    /// first if it already exists.
    pub fn with_snapshot(path: PathBuf, snapshot_on_commit: bool) -> Result<Self> {
        let inner = if path.exists() {
            snapshot::load(&path)?
        } else {
            StoreInner::default()
        };
        Ok(Self {
            inner: Mutex::new(inner),
            snapshot_path: Some(path),
            snapshot_on_commit,
        })
    }

    /// Run `f` as one transaction. The store's single mutex is held
    /// for the whole call, serializing it against every other
    /// transaction. If `f` returns `Err`, none of its mutations are
    /// visible afterwards.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Transaction) -> Result<T>,
    {
        let mut guard = self.inner.lock();
        let mut txn = Transaction::new(guard.clone());
        let result = f(&mut txn);
        match result {
            Ok(value) => {
                let changed = txn.has_pending_changes();
                txn.apply_to(&mut guard);
                if changed && self.snapshot_on_commit {
                    if let Some(path) = &self.snapshot_path {
                        if let Err(e) = snapshot::write(path, &guard) {
                            tracing::warn!(error = %e, path = %path.display(), "snapshot write failed");
                        }
                    }
                }
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
