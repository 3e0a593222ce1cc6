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

use std::{marker::PhantomData, sync::Arc};

use crate::{
    cache::{Key, MemoryCache, Value},
    reference::CloseableReference,
};

/// Callbacks on the traffic of a [`MemoryCacheManager`].
pub trait MemoryCacheCallback<K>: Send + Sync + 'static {
    /// Called on a hit of `key`.
    fn on_cache_hit(&self, key: &K);
    /// Called on a miss.
    fn on_cache_miss(&self);
    /// Called before a value is offered to the cache.
    fn on_cache_insert(&self);
}

/// Callback that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMemoryCacheCallback;

impl<K> MemoryCacheCallback<K> for NoopMemoryCacheCallback {
    fn on_cache_hit(&self, _: &K) {}
    fn on_cache_miss(&self) {}
    fn on_cache_insert(&self) {}
}

/// A [`MemoryCache`] decorator that reports the traffic to a [`MemoryCacheCallback`].
pub struct MemoryCacheManager<K, V, C>
where
    K: Key,
    V: Value,
    C: MemoryCache<K, V>,
{
    delegate: C,
    callback: Arc<dyn MemoryCacheCallback<K>>,
    _marker: PhantomData<fn() -> V>,
}

impl<K, V, C> MemoryCacheManager<K, V, C>
where
    K: Key,
    V: Value,
    C: MemoryCache<K, V>,
{
    /// Wrap `delegate` and report its traffic to `callback`.
    pub fn new(delegate: C, callback: impl MemoryCacheCallback<K>) -> Self {
        Self {
            delegate,
            callback: Arc::new(callback),
            _marker: PhantomData,
        }
    }

    /// Get the wrapped cache.
    pub fn delegate(&self) -> &C {
        &self.delegate
    }

    /// Get a client handle of the value of `key`, reporting a hit or a miss.
    pub fn get(&self, key: &K) -> Option<CloseableReference<V>> {
        let res = self.delegate.get(key);
        match res {
            Some(_) => self.callback.on_cache_hit(key),
            None => self.callback.on_cache_miss(),
        }
        res
    }

    /// Offer the value to the cache. An absent value is never cached.
    pub fn cache(&self, key: K, value: Option<&CloseableReference<V>>) -> Option<CloseableReference<V>> {
        let value = value?;
        self.callback.on_cache_insert();
        self.delegate.cache(key, value)
    }

    /// Remove the entries whose key matches `predicate` and return the count of the removed entries.
    pub fn remove_all(&self, predicate: impl Fn(&K) -> bool) -> usize {
        self.delegate.remove_all(&predicate)
    }

    /// Returns `true` if any cached key matches `predicate`.
    pub fn contains(&self, predicate: impl Fn(&K) -> bool) -> bool {
        self.delegate.contains(&predicate)
    }

    /// Returns `true` if `key` is cached.
    pub fn contains_key(&self, key: &K) -> bool {
        self.delegate.contains_key(key)
    }

    /// Remove all entries.
    pub fn clear(&self) {
        self.delegate.clear()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::{cache::CacheBuilder, params::MemoryCacheParams, raw::CountingMemoryCache};

    #[derive(Default)]
    struct Recorder {
        hits: Mutex<Vec<u64>>,
        misses: AtomicUsize,
        inserts: AtomicUsize,
    }

    impl MemoryCacheCallback<u64> for Arc<Recorder> {
        fn on_cache_hit(&self, key: &u64) {
            self.hits.lock().push(*key);
        }

        fn on_cache_miss(&self) {
            self.misses.fetch_add(1, Ordering::SeqCst);
        }

        fn on_cache_insert(&self) {
            self.inserts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn manager(recorder: &Arc<Recorder>) -> MemoryCacheManager<u64, String, CountingMemoryCache<u64, String>> {
        let cache = CacheBuilder::new(|v: &String| v.len())
            .with_params(MemoryCacheParams {
                max_cache_entry_size: 8,
                ..MemoryCacheParams::default()
            })
            .build()
            .unwrap();
        MemoryCacheManager::new(cache, recorder.clone())
    }

    #[test_log::test]
    fn test_callbacks() {
        let recorder = Arc::new(Recorder::default());
        let manager = manager(&recorder);

        assert!(manager.get(&1).is_none());
        assert!(manager.cache(1, None).is_none());
        assert_eq!(recorder.inserts.load(Ordering::SeqCst), 0);

        let mut value = CloseableReference::of_drop(String::from("one"));
        let mut client = manager.cache(1, Some(&value)).unwrap();
        value.close().unwrap();
        client.close().unwrap();

        // Rejected values still count as offered.
        let mut large = CloseableReference::of_drop(String::from("too large to cache"));
        assert!(manager.cache(2, Some(&large)).is_none());
        large.close().unwrap();

        let mut hit = manager.get(&1).unwrap();
        assert_eq!(hit.get().map(String::as_str), Some("one"));
        hit.close().unwrap();
        assert!(manager.get(&2).is_none());

        assert_eq!(*recorder.hits.lock(), vec![1]);
        assert_eq!(recorder.misses.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.inserts.load(Ordering::SeqCst), 2);
    }

    #[test_log::test]
    fn test_forwarding() {
        let recorder = Arc::new(Recorder::default());
        let manager = manager(&recorder);

        for key in 0..4u64 {
            let mut value = CloseableReference::of_drop(key.to_string());
            manager.cache(key, Some(&value)).unwrap().close().unwrap();
            value.close().unwrap();
        }
        assert!(manager.contains_key(&3));
        assert!(manager.contains(|k| k % 2 == 0));
        assert_eq!(manager.remove_all(|k| k % 2 == 0), 2);
        assert!(!manager.contains(|k| k % 2 == 0));
        assert_eq!(manager.delegate().count(), 2);

        manager.clear();
        assert_eq!(manager.delegate().count(), 0);
    }

    #[test_log::test]
    fn test_noop_callback() {
        let cache = CacheBuilder::<u64, String>::new(|v: &String| v.len()).build().unwrap();
        let manager = MemoryCacheManager::new(cache, NoopMemoryCacheCallback);
        assert!(manager.get(&0).is_none());
    }
}
