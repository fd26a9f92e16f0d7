use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use storefront_core::DomainError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not read or write.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        DomainError::Persistence(value.to_string())
    }
}

/// Fallible key/value store.
///
/// Unlike a disposable read model, carts and order-number claims must not be
/// silently dropped, so every operation reports backend failures.
pub trait KeyValueStore<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Result<Option<V>, StoreError>;

    fn upsert(&self, key: K, value: V) -> Result<(), StoreError>;

    /// Insert only if the key is free. Returns `false` when it was taken.
    fn insert_if_absent(&self, key: K, value: V) -> Result<bool, StoreError>;

    fn remove(&self, key: &K) -> Result<Option<V>, StoreError>;

    fn list(&self) -> Result<Vec<V>, StoreError>;

    /// Drop every record (rebuild support).
    fn clear(&self) -> Result<(), StoreError>;
}

impl<K, V, S> KeyValueStore<K, V> for Arc<S>
where
    S: KeyValueStore<K, V> + ?Sized,
{
    fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        (**self).get(key)
    }

    fn upsert(&self, key: K, value: V) -> Result<(), StoreError> {
        (**self).upsert(key, value)
    }

    fn insert_if_absent(&self, key: K, value: V) -> Result<bool, StoreError> {
        (**self).insert_if_absent(key, value)
    }

    fn remove(&self, key: &K) -> Result<Option<V>, StoreError> {
        (**self).remove(key)
    }

    fn list(&self) -> Result<Vec<V>, StoreError> {
        (**self).list()
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }
}

/// In-memory store for tests/dev.
#[derive(Debug)]
pub struct InMemoryKeyValueStore<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> InMemoryKeyValueStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<K, V>>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<K, V>>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

impl<K, V> Default for InMemoryKeyValueStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> KeyValueStore<K, V> for InMemoryKeyValueStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, key: &K) -> Result<Option<V>, StoreError> {
        Ok(self.read()?.get(key).cloned())
    }

    fn upsert(&self, key: K, value: V) -> Result<(), StoreError> {
        self.write()?.insert(key, value);
        Ok(())
    }

    fn insert_if_absent(&self, key: K, value: V) -> Result<bool, StoreError> {
        let mut map = self.write()?;
        if map.contains_key(&key) {
            return Ok(false);
        }
        map.insert(key, value);
        Ok(true)
    }

    fn remove(&self, key: &K) -> Result<Option<V>, StoreError> {
        Ok(self.write()?.remove(key))
    }

    fn list(&self) -> Result<Vec<V>, StoreError> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.write()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_if_absent_claims_a_key_once() {
        let store = InMemoryKeyValueStore::<String, u32>::new();

        assert!(store.insert_if_absent("ORD-1".to_string(), 1).unwrap());
        assert!(!store.insert_if_absent("ORD-1".to_string(), 2).unwrap());
        assert_eq!(store.get(&"ORD-1".to_string()).unwrap(), Some(1));
    }

    #[test]
    fn remove_and_clear() {
        let store = InMemoryKeyValueStore::<u32, &'static str>::new();
        store.upsert(1, "a").unwrap();
        store.upsert(2, "b").unwrap();

        assert_eq!(store.remove(&1).unwrap(), Some("a"));
        assert_eq!(store.remove(&1).unwrap(), None);
        assert_eq!(store.list().unwrap(), vec!["b"]);

        store.clear().unwrap();
        assert!(store.list().unwrap().is_empty());
    }
}
