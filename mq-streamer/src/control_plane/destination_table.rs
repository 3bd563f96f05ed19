//! Name-keyed table of live per-destination handles (consumers or producers).

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Storage owner for destination handles.
///
/// Lookups clone the `Arc` handle out so broker I/O never happens while the table lock is
/// held.
pub(crate) struct DestinationTable<T> {
    entries: Mutex<HashMap<String, Arc<T>>>,
}

impl<T> DestinationTable<T> {
    /// Creates an empty table.
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts a handle, returning the one it replaced.
    pub(crate) async fn insert(&self, name: &str, handle: Arc<T>) -> Option<Arc<T>> {
        self.entries.lock().await.insert(name.to_string(), handle)
    }

    /// Removes a handle. Returns `None` when no such destination is live.
    pub(crate) async fn remove(&self, name: &str) -> Option<Arc<T>> {
        self.entries.lock().await.remove(name)
    }

    pub(crate) async fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries.lock().await.get(name).cloned()
    }

    /// Sorted names of live destinations.
    pub(crate) async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Removes and returns every handle.
    pub(crate) async fn drain(&self) -> Vec<(String, Arc<T>)> {
        self.entries.lock().await.drain().collect()
    }
}
