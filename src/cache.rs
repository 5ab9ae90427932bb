//! Memo table for formula normalization.
//!
//! Formulas are immutable once parsed, so the DNF of a given formula text can be
//! reused for the whole compile run. The table is a plain [HashMap] with hit and
//! miss counters, so the compiler can log how much work it saved.

use std::collections::HashMap;
use std::hash::Hash;

/// A cache backed by [HashMap].
pub struct Cache<K, V> {
    map: HashMap<K, V>,
    enabled: bool,
    hits: usize,
    misses: usize,
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self::new(true)
    }
}

impl<K, V> Cache<K, V> {
    /// Creates a new cache. A disabled cache never stores anything.
    pub fn new(enabled: bool) -> Self {
        Self {
            map: HashMap::new(),
            enabled,
            hits: 0,
            misses: 0,
        }
    }

    /// Returns the number of entries in the cache.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the number of cache hits.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Returns the number of cache misses.
    pub fn misses(&self) -> usize {
        self.misses
    }

    /// Clears all entries and counters.
    pub fn clear(&mut self) {
        self.map.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Looks up `key`, computing and storing the value on a miss.
    ///
    /// Errors from `compute` are passed through and nothing is stored.
    pub fn get_or_try_insert<E, F>(&mut self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce(&K) -> Result<V, E>,
    {
        if let Some(value) = self.map.get(&key) {
            self.hits += 1;
            return Ok(value.clone());
        }
        self.misses += 1;
        let value = compute(&key)?;
        if self.enabled {
            self.map.insert(key, value.clone());
        }
        Ok(value)
    }
}
