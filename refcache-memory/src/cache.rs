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

use std::{hash::Hash, marker::PhantomData, sync::Arc, time::Duration};

use refcache_common::metrics::{model::Metrics, registry::noop::NoopMetricsRegistry, BoxedRegistry};

use crate::{
    error::{Error, Result},
    lru_map::Weighter,
    params::{MemoryCacheParams, ParamsProvider, PARAMS_CHECK_INTERVAL},
    raw::{CountingMemoryCache, RawCacheConfig},
    reference::CloseableReference,
    trim::{DefaultTrimStrategy, TrimStrategy},
};

/// Key trait for the in-memory cache.
pub trait Key: Send + Sync + 'static + Hash + Eq + Clone {}
impl<T: Send + Sync + 'static + Hash + Eq + Clone> Key for T {}

/// Value trait for the in-memory cache.
pub trait Value: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Value for T {}

/// The interface of a memory cache that hands out closeable client handles.
pub trait MemoryCache<K, V>: Send + Sync + 'static
where
    K: Key,
    V: Value,
{
    /// Cache the value and return a client handle, or `None` if the value is not admitted.
    fn cache(&self, key: K, value: &CloseableReference<V>) -> Option<CloseableReference<V>>;

    /// Get a client handle of the value of `key`.
    fn get(&self, key: &K) -> Option<CloseableReference<V>>;

    /// Remove the entries whose key matches `predicate` and return the count of the removed entries.
    fn remove_all(&self, predicate: &dyn Fn(&K) -> bool) -> usize;

    /// Returns `true` if any cached key matches `predicate`.
    fn contains(&self, predicate: &dyn Fn(&K) -> bool) -> bool;

    /// Returns `true` if `key` is cached.
    fn contains_key(&self, key: &K) -> bool;

    /// Remove all entries.
    fn clear(&self) {
        self.remove_all(&|_| true);
    }
}

impl<K, V> MemoryCache<K, V> for CountingMemoryCache<K, V>
where
    K: Key,
    V: Value,
{
    fn cache(&self, key: K, value: &CloseableReference<V>) -> Option<CloseableReference<V>> {
        CountingMemoryCache::cache(self, key, value)
    }

    fn get(&self, key: &K) -> Option<CloseableReference<V>> {
        CountingMemoryCache::get(self, key)
    }

    fn remove_all(&self, predicate: &dyn Fn(&K) -> bool) -> usize {
        CountingMemoryCache::remove_all(self, predicate)
    }

    fn contains(&self, predicate: &dyn Fn(&K) -> bool) -> bool {
        CountingMemoryCache::contains(self, predicate)
    }

    fn contains_key(&self, key: &K) -> bool {
        CountingMemoryCache::contains_key(self, key)
    }

    fn clear(&self) {
        CountingMemoryCache::clear(self)
    }
}

/// In-memory cache builder.
pub struct CacheBuilder<K, V> {
    name: &'static str,
    weighter: Arc<dyn Weighter<V>>,
    params_provider: Arc<dyn ParamsProvider>,
    params_check_interval: Duration,
    trim_strategy: Arc<dyn TrimStrategy>,
    registry: BoxedRegistry,
    _marker: PhantomData<fn() -> K>,
}

impl<K, V> CacheBuilder<K, V>
where
    K: Key,
    V: Value,
{
    /// Create in-memory cache builder that weighs the values with `weighter`.
    ///
    /// The weighter runs before the cache is locked and may call back into the cache.
    pub fn new(weighter: impl Weighter<V>) -> Self {
        Self {
            name: "refcache",
            weighter: Arc::new(weighter),
            params_provider: Arc::new(MemoryCacheParams::default),
            params_check_interval: PARAMS_CHECK_INTERVAL,
            trim_strategy: Arc::new(DefaultTrimStrategy),
            registry: Box::new(NoopMetricsRegistry),
            _marker: PhantomData,
        }
    }

    /// Set the name of the in-memory cache.
    ///
    /// The name is used as the `name` label of the metrics.
    ///
    /// Default: `refcache`.
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Use fixed params.
    pub fn with_params(mut self, params: MemoryCacheParams) -> Self {
        self.params_provider = Arc::new(move || params);
        self
    }

    /// Set the provider to refresh the params from.
    ///
    /// The provider is called once when the cache is built, then at most once per params check interval.
    ///
    /// Default: [`MemoryCacheParams::default`].
    pub fn with_params_provider(mut self, params_provider: impl ParamsProvider) -> Self {
        self.params_provider = Arc::new(params_provider);
        self
    }

    /// Set the min interval between two params refreshes.
    ///
    /// Default: 5 minutes.
    pub fn with_params_check_interval(mut self, interval: Duration) -> Self {
        self.params_check_interval = interval;
        self
    }

    /// Set the strategy that maps memory pressure events to trim ratios.
    ///
    /// Default: [`DefaultTrimStrategy`].
    pub fn with_trim_strategy(mut self, trim_strategy: impl TrimStrategy) -> Self {
        self.trim_strategy = Arc::new(trim_strategy);
        self
    }

    /// Set metrics registry.
    ///
    /// Default: [`NoopMetricsRegistry`].
    pub fn with_metrics_registry(mut self, registry: BoxedRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Build in-memory cache with the given configuration.
    pub fn build(self) -> Result<CountingMemoryCache<K, V>> {
        let params = (self.params_provider)();
        if params.max_cache_entries == 0 || params.max_cache_size == 0 {
            return Err(Error::ConfigError(format!(
                "cache {} can never admit a value with params {params:?}",
                self.name
            )));
        }

        let metrics = Arc::new(Metrics::new(self.name, self.registry.as_ref()));
        tracing::debug!("[refcache memory]: build cache {} with params {params:?}", self.name);

        let config = RawCacheConfig {
            name: self.name,
            weighter: self.weighter,
            params_provider: self.params_provider,
            params_check_interval: self.params_check_interval,
            trim_strategy: self.trim_strategy,
            metrics,
        };
        Ok(CountingMemoryCache::new(config, params))
    }
}
