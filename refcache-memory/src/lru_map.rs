// Copyright 2026 refcache Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{fmt::Debug, hash::Hash, sync::Arc};

use itertools::Itertools;
use ordered_hash_map::OrderedHashMap;

/// Weight of a value in bytes.
pub trait Weighter<V>: Fn(&V) -> usize + Send + Sync + 'static {}
impl<V, F> Weighter<V> for F where F: Fn(&V) -> usize + Send + Sync + 'static {}

/// A key-value map that keeps the insertion order and the total weight of its values.
///
/// The first key is always the least recently inserted one. Re-inserting an existing key moves it to the back.
///
/// Every mutation updates the total weight together with the map, so the two never disagree for a caller that holds
/// the map.
pub struct CountingLruMap<K, V> {
    map: OrderedHashMap<K, V>,
    weighter: Arc<dyn Weighter<V>>,
    size_in_bytes: usize,
}

impl<K, V> Debug for CountingLruMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingLruMap")
            .field("count", &self.map.len())
            .field("size_in_bytes", &self.size_in_bytes)
            .finish()
    }
}

impl<K, V> CountingLruMap<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty map that weighs the values with `weighter`.
    pub fn new(weighter: Arc<dyn Weighter<V>>) -> Self {
        Self {
            map: OrderedHashMap::new(),
            weighter,
            size_in_bytes: 0,
        }
    }

    /// Get the count of the entries.
    pub fn count(&self) -> usize {
        self.map.len()
    }

    /// Get the total weight of the values.
    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    /// Get the least recently inserted key.
    pub fn first_key(&self) -> Option<&K> {
        self.map.iter().next().map(|(k, _)| k)
    }

    /// Get a snapshot of the keys, in insertion order.
    pub fn keys(&self) -> Vec<K> {
        self.map.iter().map(|(k, _)| k.clone()).collect()
    }

    /// Get a snapshot of the values, in insertion order.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.map.iter().map(|(_, v)| v.clone()).collect()
    }

    /// Get the entries whose key matches `predicate`, in insertion order. `None` matches every entry.
    pub fn matching_entries(&self, predicate: Option<&dyn Fn(&K) -> bool>) -> Vec<(&K, &V)> {
        self.map
            .iter()
            .filter(|&(k, _)| predicate.is_none_or(|predicate| predicate(k)))
            .collect()
    }

    /// Returns `true` if the map holds `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Get the value of `key`. The insertion order is not touched.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    /// Insert the value at the back of the order and return the value it replaced.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        // Remove first, so a re-inserted key moves to the back.
        let old = self.remove(&key);
        self.size_in_bytes += (self.weighter)(&value);
        self.map.insert(key, value);
        old
    }

    /// Remove the value of `key`.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let value = self.map.remove(key)?;
        self.size_in_bytes -= (self.weighter)(&value);
        Some(value)
    }

    /// Remove the entries whose key matches `predicate` and return their values in insertion order. `None` matches
    /// every entry.
    pub fn remove_all(&mut self, predicate: Option<&dyn Fn(&K) -> bool>) -> Vec<V> {
        let keys = self
            .matching_entries(predicate)
            .into_iter()
            .map(|(k, _)| k.clone())
            .collect_vec();
        keys.iter().filter_map(|key| self.remove(key)).collect()
    }

    /// Remove every entry and return the values in insertion order.
    pub fn clear(&mut self) -> Vec<V> {
        let mut values = Vec::with_capacity(self.map.len());
        while let Some(value) = self.map.pop_front() {
            values.push(value);
        }
        self.size_in_bytes = 0;
        values
    }
}
