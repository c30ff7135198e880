use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The Store maps string keys to byte values. Every operation takes the internal reader/writer
/// lock, so concurrent readers proceed in parallel while a write excludes everyone else. The store
/// is cheap to clone, clones share the same underlying data.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl Store {
    pub fn new() -> Store {
        Self::default()
    }

    /// Returns the value stored at `key`, if any.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.read().get(key).cloned()
    }

    /// Stores `value` at `key`, overwriting any previous value.
    pub fn set(&self, key: String, value: Bytes) {
        self.write().insert(key, value);
    }

    /// Removes every given key that is present and returns how many were removed. Missing keys
    /// are ignored.
    pub fn del<K: AsRef<str>>(&self, keys: &[K]) -> usize {
        let mut state = self.write();
        let mut removed = 0;
        for key in keys {
            let key: &str = key.as_ref();
            if state.remove(key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// A snapshot of the keys present at call time, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.read().len()
    }

    // Poisoning is ignored: the map is only mutated through single `HashMap` calls.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Bytes>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Bytes>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
