//! The data-fetch cache backing `use_data` (§4.3 "Data fetch", §9
//! "Async-as-suspension").
//!
//! Ownership is deliberately outside [`pc_core::RenderContext`]: a
//! render is synchronous and scoped to one begin-work attempt, while a
//! fetch resolves asynchronously and must outlive any single render.
//! `pc-reconciler` owns one `DataCache` per execution, fills it from
//! spawned fetches, and retries begin-work on a fiber once its pending
//! key resolves.

use pc_core::DataState;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::Notify;

enum CacheEntry {
    Pending(std::sync::Arc<Notify>),
    Ready(Box<dyn Any + Send + Sync>),
}

/// A keyed, per-execution cache of suspending data values.
pub struct DataCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for DataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DataCache {
    /// Construct an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up `key`. Registers it as pending (and returns a notify
    /// handle reconciler can await) the first time it is seen.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> DataState<T> {
        let mut entries = self.entries.lock().expect("data cache poisoned");
        match entries.get(key) {
            Some(CacheEntry::Ready(v)) => match v.downcast_ref::<T>() {
                Some(v) => DataState::Ready(v.clone()),
                None => DataState::Pending { key: key.to_owned() },
            },
            Some(CacheEntry::Pending(_)) => DataState::Pending { key: key.to_owned() },
            None => {
                entries.insert(key.to_owned(), CacheEntry::Pending(Default::default()));
                DataState::Pending { key: key.to_owned() }
            }
        }
    }

    /// A notify handle for `key`, if one is currently pending. Used by
    /// the reconciler's suspension-retry loop to await resolution
    /// instead of busy-polling.
    pub fn notify_handle(&self, key: &str) -> Option<std::sync::Arc<Notify>> {
        let entries = self.entries.lock().expect("data cache poisoned");
        match entries.get(key) {
            Some(CacheEntry::Pending(notify)) => Some(notify.clone()),
            _ => None,
        }
    }

    /// Resolve `key` with a value, waking anyone awaiting its notify handle.
    pub fn set_ready<T: Send + Sync + 'static>(&self, key: &str, value: T) {
        let mut entries = self.entries.lock().expect("data cache poisoned");
        let notify = match entries.get(key) {
            Some(CacheEntry::Pending(n)) => Some(n.clone()),
            _ => None,
        };
        entries.insert(key.to_owned(), CacheEntry::Ready(Box::new(value)));
        if let Some(notify) = notify {
            notify.notify_waiters();
        }
    }

    /// Drop a cached entry, forcing the next `get` to re-fetch.
    pub fn invalidate(&self, key: &str) {
        self.entries
            .lock()
            .expect("data cache poisoned")
            .remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_get_is_pending_second_is_ready() {
        let cache = DataCache::new();
        assert!(matches!(cache.get::<u32>("k"), DataState::Pending { .. }));
        cache.set_ready("k", 42u32);
        match cache.get::<u32>("k") {
            DataState::Ready(v) => assert_eq!(v, 42),
            DataState::Pending { .. } => panic!("expected ready"),
        }
    }
}
