use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::store::ContributionStore;

/// Owns the contribution store and the per-project merge locks.
///
/// The canonical model is the only mutable shared resource, and its
/// load-merge-save sequence must be serialized per project — without the
/// lock two concurrent submissions can read the same stale canonical set
/// and one merge is silently lost. Locks are created lazily and projects
/// never share one, so submissions to distinct projects proceed fully in
/// parallel.
pub struct ProjectRegistry {
    store: ContributionStore,
    merge_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl ProjectRegistry {
    pub fn new(store: ContributionStore) -> Self {
        Self {
            store,
            merge_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &ContributionStore {
        &self.store
    }

    /// Returns `project`'s merge lock, creating it on first use.
    pub fn merge_lock(&self, project: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.merge_locks.lock();
        Arc::clone(locks.entry(project.to_string()).or_default())
    }
}
