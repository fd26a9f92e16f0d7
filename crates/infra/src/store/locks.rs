//! Per-key mutual exclusion for read-modify-write sequences.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use storefront_core::{DomainError, DomainResult};

/// A lazily grown table of one `Mutex` per key. Distinct keys never contend.
#[derive(Debug)]
pub struct KeyedLocks<K> {
    name: &'static str,
    locks: RwLock<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K> KeyedLocks<K>
where
    K: Eq + Hash + Copy,
{
    /// `name` shows up in poisoning errors (`"cart lock poisoned"`).
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// The mutex guarding `key`, created on first use.
    pub fn handle(&self, key: K) -> DomainResult<Arc<Mutex<()>>> {
        {
            let locks = self.locks.read().map_err(|_| self.poisoned("lock table"))?;
            if let Some(lock) = locks.get(&key) {
                return Ok(lock.clone());
            }
        }
        let mut locks = self.locks.write().map_err(|_| self.poisoned("lock table"))?;
        Ok(locks.entry(key).or_default().clone())
    }

    /// Block until `lock` (a handle from this table) is held.
    pub fn acquire<'a>(&self, lock: &'a Mutex<()>) -> DomainResult<MutexGuard<'a, ()>> {
        lock.lock().map_err(|_| self.poisoned("lock"))
    }

    fn poisoned(&self, what: &str) -> DomainError {
        DomainError::persistence(format!("{} {what} poisoned", self.name))
    }
}
