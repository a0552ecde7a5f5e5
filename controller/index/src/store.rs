use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, trace};
use volm_controller_core::Named;

pub type SharedStore<T> = Arc<Store<T>>;

/// Holds the last-known record for each name in a collection.
///
/// All operations serialize on a single lock. Reads return shared handles to records so that
/// snapshots only copy pointers while the lock is held.
#[derive(Debug)]
pub struct Store<T> {
    index: Mutex<HashMap<String, Arc<T>>>,
}

// === impl Store ===

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self {
            index: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Named> Store<T> {
    pub fn shared() -> SharedStore<T> {
        Arc::new(Self::default())
    }

    /// Inserts or replaces the record with the same name.
    pub fn upsert(&self, record: T) {
        let name = record.name().to_string();
        trace!(%name, "Upserting");
        self.index.lock().insert(name, Arc::new(record));
    }

    /// Removes the named record, if it exists.
    pub fn remove(&self, name: &str) {
        if self.index.lock().remove(name).is_some() {
            debug!(%name, "Removed");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.index.lock().get(name).cloned()
    }

    /// Returns a point-in-time copy of all records, in no particular order.
    pub fn list(&self) -> Vec<Arc<T>> {
        self.index.lock().values().cloned().collect()
    }

    /// Atomically replaces the store's contents with `records`.
    ///
    /// Names absent from `records` are dropped. If `records` holds several entries with the same
    /// name, the last one wins.
    pub fn replace(&self, records: impl IntoIterator<Item = T>) {
        let index = records
            .into_iter()
            .map(|r| (r.name().to_string(), Arc::new(r)))
            .collect::<HashMap<_, _>>();
        let len = index.len();

        let prior = std::mem::replace(&mut *self.index.lock(), index);
        debug!(prior = prior.len(), len, "Replaced");
        drop(prior);
    }

    pub fn len(&self) -> usize {
        self.index.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
