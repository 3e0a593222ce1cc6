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

use std::{
    fmt::Debug,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use refcache_common::{metrics::Metrics, strict_assert};

use crate::{
    cache::{Key, Value},
    entry::Entry,
    lru_map::{CountingLruMap, Weighter},
    observer::EntryStateObserver,
    params::{MemoryCacheParams, ParamsProvider},
    reference::CloseableReference,
    trim::{MemoryTrimType, MemoryTrimmable, TrimStrategy},
};

pub(crate) struct RawCacheConfig<V> {
    pub name: &'static str,
    pub weighter: Arc<dyn Weighter<V>>,
    pub params_provider: Arc<dyn ParamsProvider>,
    pub params_check_interval: Duration,
    pub trim_strategy: Arc<dyn TrimStrategy>,
    pub metrics: Arc<Metrics>,
}

/// Side effects collected in the locked phase of an operation, applied after the lock is released.
struct Garbage<K, V> {
    releases: Vec<CloseableReference<V>>,
    notifications: Vec<(Arc<Entry<K, V>>, bool)>,
}

impl<K, V> Default for Garbage<K, V> {
    fn default() -> Self {
        Self {
            releases: vec![],
            notifications: vec![],
        }
    }
}

impl<K, V> Garbage<K, V> {
    fn notify(&mut self, entry: &Arc<Entry<K, V>>, is_exclusive: bool) {
        if entry.observer().is_some() {
            self.notifications.push((entry.clone(), is_exclusive));
        }
    }

    /// Release the value of the entry if it is dead.
    fn release_if_dead(&mut self, entry: &Entry<K, V>) {
        if entry.is_orphan() && entry.clients() == 0 {
            if let Some(value) = entry.take() {
                self.releases.push(value);
            }
        }
    }

    fn orphan(&mut self, entry: &Entry<K, V>) {
        entry.set_orphan();
        self.release_if_dead(entry);
    }
}

struct State<K, V> {
    /// Every tracked entry, in use or not.
    cached: CountingLruMap<K, Arc<Entry<K, V>>>,
    /// Tracked entries without clients, in eviction order.
    exclusive: CountingLruMap<K, Arc<Entry<K, V>>>,
    params: MemoryCacheParams,
    last_params_check: Instant,
}

impl<K, V> State<K, V>
where
    K: Key,
    V: Value,
{
    fn in_use_count(&self) -> usize {
        self.cached.count() - self.exclusive.count()
    }

    fn in_use_size(&self) -> usize {
        self.cached.size_in_bytes() - self.exclusive.size_in_bytes()
    }

    /// Admission is checked against the in-use totals only. The eviction queue can always be evicted to make room.
    ///
    /// A weight that would overflow the total size of the cached entries is never admitted.
    fn can_cache(&self, weight: usize) -> bool {
        weight <= self.params.max_cache_entry_size
            && self.in_use_count() < self.params.max_cache_entries
            && self
                .in_use_size()
                .checked_add(weight)
                .is_some_and(|size| size <= self.params.max_cache_size)
            && self.cached.size_in_bytes().checked_add(weight).is_some()
    }

    fn add_to_exclusive_if_unused(&mut self, entry: &Arc<Entry<K, V>>) -> bool {
        if entry.is_orphan() || entry.clients() > 0 {
            return false;
        }
        strict_assert!(!entry.is_in_exclusive());
        self.exclusive.put(entry.key().clone(), entry.clone());
        entry.set_in_exclusive(true);
        true
    }

    fn remove_from_exclusive(&mut self, key: &K) -> Option<Arc<Entry<K, V>>> {
        let entry = self.exclusive.remove(key)?;
        entry.set_in_exclusive(false);
        Some(entry)
    }

    /// Remove the least recently queued exclusive entries until the queue fits both `count` and `size`.
    fn trim_exclusive(&mut self, count: usize, size: usize) -> Vec<Arc<Entry<K, V>>> {
        if self.exclusive.count() <= count && self.exclusive.size_in_bytes() <= size {
            return vec![];
        }
        let mut evicted = vec![];
        while self.exclusive.count() > count || self.exclusive.size_in_bytes() > size {
            let Some(key) = self.exclusive.first_key().cloned() else {
                break;
            };
            let Some(entry) = self.remove_from_exclusive(&key) else {
                break;
            };
            let cached = self.cached.remove(&key);
            strict_assert!(cached.is_some_and(|cached| Arc::ptr_eq(&cached, &entry)));
            evicted.push(entry);
        }
        evicted
    }
}

struct Inner<K, V>
where
    K: Key,
    V: Value,
{
    name: &'static str,
    state: Mutex<State<K, V>>,

    weighter: Arc<dyn Weighter<V>>,
    params_provider: Arc<dyn ParamsProvider>,
    params_check_interval: Duration,
    trim_strategy: Arc<dyn TrimStrategy>,

    metrics: Arc<Metrics>,
}

impl<K, V> Drop for Inner<K, V>
where
    K: Key,
    V: Value,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K, V> Inner<K, V>
where
    K: Key,
    V: Value,
{
    /// Release the collected values, then notify the observers. Must be called without the lock.
    fn dispose(&self, garbage: Garbage<K, V>) {
        for mut value in garbage.releases {
            match value.close() {
                Ok(()) => self.metrics.memory_release.increase(1),
                Err(e) => {
                    self.metrics.memory_release_failure.increase(1);
                    tracing::error!("[refcache memory]: cache {} release value error: {e}", self.name);
                }
            }
        }
        for (entry, is_exclusive) in garbage.notifications {
            if let Some(observer) = entry.observer() {
                observer.on_exclusivity_changed(entry.key(), is_exclusive);
            }
        }
    }

    fn report(&self, state: &State<K, V>) {
        self.metrics
            .memory_usage
            .absolute(state.cached.size_in_bytes() as u64);
        self.metrics.memory_in_use_usage.absolute(state.in_use_size() as u64);
    }

    /// Create a client handle of a tracked entry.
    fn new_client(self: &Arc<Self>, entry: &Arc<Entry<K, V>>) -> Option<CloseableReference<V>> {
        strict_assert!(!entry.is_orphan());
        let value = entry.share()?;
        entry.inc_clients();
        let inner = self.clone();
        let entry = entry.clone();
        Some(CloseableReference::with_hook(value, move || inner.release_client(&entry)))
    }

    fn release_client(&self, entry: &Arc<Entry<K, V>>) {
        let mut garbage = Garbage::default();
        {
            let mut state = self.state.lock();
            entry.dec_clients();
            if state.add_to_exclusive_if_unused(entry) {
                garbage.notify(entry, true);
            }
            garbage.release_if_dead(entry);
            self.report(&state);
        }
        self.dispose(garbage);
        self.maybe_update_params();
        self.maybe_evict();
    }

    fn cache(
        self: &Arc<Self>,
        key: K,
        value: &CloseableReference<V>,
        observer: Option<Arc<dyn EntryStateObserver<K>>>,
    ) -> Option<CloseableReference<V>> {
        self.maybe_update_params();

        let weight = value.get().map(|v| (self.weighter)(v));

        let mut garbage = Garbage::default();
        let client = {
            let mut state = self.state.lock();

            if let Some(old) = state.remove_from_exclusive(&key) {
                garbage.notify(&old, false);
            }
            if let Some(old) = state.cached.remove(&key) {
                garbage.orphan(&old);
                self.metrics.memory_replace.increase(1);
            }

            let admitted = match weight {
                Some(weight) if state.can_cache(weight) => value.clone_or_none().map(|owned| (owned, weight)),
                _ => None,
            };

            let client = match admitted {
                Some((owned, weight)) => {
                    let entry = Arc::new(Entry::new(key.clone(), owned, observer, weight));
                    let old = state.cached.put(key, entry.clone());
                    strict_assert!(old.is_none());
                    self.metrics.memory_insert.increase(1);
                    self.new_client(&entry)
                }
                None => {
                    tracing::debug!(
                        "[refcache memory]: cache {} rejects value (weight: {weight:?}, in use: {} entries, {} bytes)",
                        self.name,
                        state.in_use_count(),
                        state.in_use_size()
                    );
                    self.metrics.memory_reject.increase(1);
                    None
                }
            };
            self.report(&state);
            client
        };

        self.dispose(garbage);
        self.maybe_evict();
        client
    }

    fn get(self: &Arc<Self>, key: &K) -> Option<CloseableReference<V>> {
        let mut garbage = Garbage::default();
        let client = {
            let mut state = self.state.lock();
            if let Some(old) = state.remove_from_exclusive(key) {
                garbage.notify(&old, false);
            }
            let client = state.cached.get(key).cloned().and_then(|entry| self.new_client(&entry));
            match client {
                Some(_) => self.metrics.memory_hit.increase(1),
                None => self.metrics.memory_miss.increase(1),
            }
            self.report(&state);
            client
        };

        self.dispose(garbage);
        self.maybe_update_params();
        self.maybe_evict();
        client
    }

    fn reuse(&self, key: &K) -> Option<CloseableReference<V>> {
        let mut garbage = Garbage::default();
        let reused = {
            let mut state = self.state.lock();
            let entry = state
                .exclusive
                .get(key)
                .filter(|entry| entry.clients() == 0)
                .cloned();
            let reused = entry.and_then(|entry| {
                state.remove_from_exclusive(key);
                let cached = state.cached.remove(key);
                strict_assert!(cached.is_some_and(|cached| Arc::ptr_eq(&cached, &entry)));
                // The value moves to the caller instead of being released.
                entry.set_orphan();
                garbage.notify(&entry, false);
                entry.take()
            });
            if reused.is_some() {
                self.metrics.memory_reuse.increase(1);
            }
            self.report(&state);
            reused
        };

        self.dispose(garbage);
        reused
    }

    fn remove_all(&self, predicate: Option<&dyn Fn(&K) -> bool>) -> usize {
        let mut garbage = Garbage::default();
        let count = {
            let mut state = self.state.lock();
            for entry in state.exclusive.remove_all(predicate) {
                entry.set_in_exclusive(false);
                garbage.notify(&entry, false);
            }
            let removed = state.cached.remove_all(predicate);
            removed.iter().for_each(|entry| garbage.orphan(entry));
            self.metrics.memory_remove.increase(removed.len() as u64);
            self.report(&state);
            removed.len()
        };

        self.dispose(garbage);
        count
    }

    fn clear(&self) {
        let count = self.remove_all(None);
        tracing::debug!("[refcache memory]: cache {} cleared {count} entries", self.name);
    }

    fn contains(&self, predicate: &dyn Fn(&K) -> bool) -> bool {
        !self.state.lock().cached.matching_entries(Some(predicate)).is_empty()
    }

    fn contains_key(&self, key: &K) -> bool {
        self.state.lock().cached.contains(key)
    }

    fn trim(&self, trim_type: MemoryTrimType) {
        let ratio = match self.trim_strategy.trim_ratio(trim_type) {
            ratio if (0.0..=1.0).contains(&ratio) => ratio,
            ratio => {
                tracing::warn!(
                    "[refcache memory]: cache {} got trim ratio {ratio} for {trim_type:?}, clamp it to [0, 1]",
                    self.name
                );
                if ratio > 1.0 {
                    1.0
                } else {
                    0.0
                }
            }
        };

        let mut garbage = Garbage::default();
        {
            let mut state = self.state.lock();
            let target = (state.cached.size_in_bytes() as f64 * (1.0 - ratio)) as usize;
            let target = target.saturating_sub(state.in_use_size());
            let evicted = state.trim_exclusive(usize::MAX, target);
            for entry in evicted.iter() {
                garbage.orphan(entry);
                garbage.notify(entry, false);
            }
            self.metrics.memory_trim.increase(evicted.len() as u64);
            self.report(&state);
            tracing::debug!(
                "[refcache memory]: cache {} trimmed {} entries for {trim_type:?} (ratio: {ratio})",
                self.name,
                evicted.len()
            );
        }

        self.dispose(garbage);
        self.maybe_update_params();
        self.maybe_evict();
    }

    /// Evict the exclusive entries that exceed the eviction queue budgets.
    fn maybe_evict(&self) {
        let mut garbage = Garbage::default();
        {
            let mut state = self.state.lock();
            let params = state.params;
            let count = params
                .max_eviction_queue_entries
                .min(params.max_cache_entries.saturating_sub(state.in_use_count()));
            let size = params
                .max_eviction_queue_size
                .min(params.max_cache_size.saturating_sub(state.in_use_size()));
            let evicted = state.trim_exclusive(count, size);
            if evicted.is_empty() {
                return;
            }
            for entry in evicted.iter() {
                garbage.orphan(entry);
                garbage.notify(entry, false);
            }
            self.metrics.memory_evict.increase(evicted.len() as u64);
            self.report(&state);
        }
        self.dispose(garbage);
    }

    /// Refresh the params if the last refresh is older than the check interval.
    ///
    /// The provider is called out of the lock. Only the caller that wins the timestamp update calls it.
    fn maybe_update_params(&self) {
        let now = Instant::now();
        {
            let mut state = self.state.lock();
            if now.saturating_duration_since(state.last_params_check) < self.params_check_interval {
                return;
            }
            state.last_params_check = now;
        }
        let params = (self.params_provider)();
        tracing::trace!("[refcache memory]: cache {} refresh params: {params:?}", self.name);
        self.state.lock().params = params;
    }
}

/// A reference-counted LRU memory cache.
///
/// The cache tracks every entry it admitted in a map, and the entries that no client uses in an eviction queue.
/// [`CountingMemoryCache::cache`] and [`CountingMemoryCache::get`] hand out client handles. The entry stays in use
/// until all of its client handles are closed, and only then becomes a candidate for eviction.
///
/// An entry displaced from the cache while in use becomes an orphan. Its value is released when its last client
/// handle is closed.
///
/// Values are released, and observers notified, after the cache lock is released. Both may call back into the cache.
pub struct CountingMemoryCache<K, V>
where
    K: Key,
    V: Value,
{
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Debug for CountingMemoryCache<K, V>
where
    K: Key,
    V: Value,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CountingMemoryCache")
            .field("name", &self.inner.name)
            .field("count", &state.cached.count())
            .field("in_use_count", &state.in_use_count())
            .field("size_in_bytes", &state.cached.size_in_bytes())
            .finish()
    }
}

impl<K, V> Clone for CountingMemoryCache<K, V>
where
    K: Key,
    V: Value,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V> CountingMemoryCache<K, V>
where
    K: Key,
    V: Value,
{
    pub(crate) fn new(config: RawCacheConfig<V>, params: MemoryCacheParams) -> Self {
        let weighter: Arc<dyn Weighter<Arc<Entry<K, V>>>> = Arc::new(|entry: &Arc<Entry<K, V>>| entry.weight());
        let state = State {
            cached: CountingLruMap::new(weighter.clone()),
            exclusive: CountingLruMap::new(weighter),
            params,
            last_params_check: Instant::now(),
        };
        let inner = Inner {
            name: config.name,
            state: Mutex::new(state),
            weighter: config.weighter,
            params_provider: config.params_provider,
            params_check_interval: config.params_check_interval,
            trim_strategy: config.trim_strategy,
            metrics: config.metrics,
        };
        Self { inner: Arc::new(inner) }
    }

    /// Cache the value of `value` under `key` and return a client handle of the new entry.
    ///
    /// The cache keeps its own clone of `value`. The caller still owns `value` and must close it as usual.
    ///
    /// Any previous entry of `key` is displaced first. Returns `None` if the value is not admitted, which happens if
    /// `value` is closed, if the value exceeds the max entry size, or if the in-use entries leave no room for it.
    pub fn cache(&self, key: K, value: &CloseableReference<V>) -> Option<CloseableReference<V>> {
        self.inner.cache(key, value, None)
    }

    /// Same as [`CountingMemoryCache::cache`], and notify `observer` when the entry gains or loses exclusivity.
    pub fn cache_with_observer(
        &self,
        key: K,
        value: &CloseableReference<V>,
        observer: impl EntryStateObserver<K>,
    ) -> Option<CloseableReference<V>> {
        self.inner.cache(key, value, Some(Arc::new(observer)))
    }

    /// Get a client handle of the entry of `key`.
    ///
    /// The entry leaves the eviction queue until the handle is closed.
    pub fn get(&self, key: &K) -> Option<CloseableReference<V>> {
        self.inner.get(key)
    }

    /// Take the value of an entry that no client uses, removing the entry from the cache.
    ///
    /// The returned handle is the cache's own handle of the value, so the value is not released. Returns `None` if
    /// `key` is not cached or is in use.
    pub fn reuse(&self, key: &K) -> Option<CloseableReference<V>> {
        self.inner.reuse(key)
    }

    /// Remove the entries whose key matches `predicate`, and return the count of the removed entries.
    ///
    /// Entries in use are released when their last client handle is closed.
    ///
    /// `predicate` runs with the cache locked and must not call back into the cache.
    pub fn remove_all(&self, predicate: impl Fn(&K) -> bool) -> usize {
        self.inner.remove_all(Some(&predicate))
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.inner.clear()
    }

    /// Returns `true` if any cached key matches `predicate`.
    ///
    /// `predicate` runs with the cache locked and must not call back into the cache.
    pub fn contains(&self, predicate: impl Fn(&K) -> bool) -> bool {
        self.inner.contains(&predicate)
    }

    /// Returns `true` if `key` is cached.
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    /// Free a share of the cache for the memory pressure event, as decided by the trim strategy.
    ///
    /// Only entries in the eviction queue are trimmed.
    pub fn trim(&self, trim_type: MemoryTrimType) {
        self.inner.trim(trim_type)
    }

    /// Get the cache name.
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Get the params in effect.
    pub fn params(&self) -> MemoryCacheParams {
        self.inner.state.lock().params
    }

    /// Get the count of the cached entries.
    pub fn count(&self) -> usize {
        self.inner.state.lock().cached.count()
    }

    /// Get the total size of the cached entries.
    pub fn size_in_bytes(&self) -> usize {
        self.inner.state.lock().cached.size_in_bytes()
    }

    /// Get the count of the entries with clients.
    pub fn in_use_count(&self) -> usize {
        self.inner.state.lock().in_use_count()
    }

    /// Get the total size of the entries with clients.
    pub fn in_use_size_in_bytes(&self) -> usize {
        self.inner.state.lock().in_use_size()
    }

    /// Get the count of the entries in the eviction queue.
    pub fn eviction_queue_count(&self) -> usize {
        self.inner.state.lock().exclusive.count()
    }

    /// Get the total size of the entries in the eviction queue.
    pub fn eviction_queue_size_in_bytes(&self) -> usize {
        self.inner.state.lock().exclusive.size_in_bytes()
    }

    /// Get the metrics of the cache.
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let state = self.inner.state.lock();
        let mut exclusive_size = 0;
        for (key, entry) in state.exclusive.matching_entries(None) {
            let cached = state.cached.get(key).expect("exclusive entry must be cached");
            assert!(Arc::ptr_eq(cached, entry));
            assert_eq!(entry.clients(), 0);
            assert!(!entry.is_orphan());
            assert!(entry.is_in_exclusive());
            exclusive_size += entry.weight();
        }
        let mut cached_size = 0;
        for (_, entry) in state.cached.matching_entries(None) {
            assert!(!entry.is_orphan());
            assert_eq!(entry.is_in_exclusive(), entry.clients() == 0);
            cached_size += entry.weight();
        }
        assert_eq!(state.exclusive.size_in_bytes(), exclusive_size);
        assert_eq!(state.cached.size_in_bytes(), cached_size);
        assert!(state.cached.count() >= state.exclusive.count());
    }
}

impl<K, V> MemoryTrimmable for CountingMemoryCache<K, V>
where
    K: Key,
    V: Value,
{
    fn trim(&self, trim_type: MemoryTrimType) {
        CountingMemoryCache::trim(self, trim_type)
    }
}
