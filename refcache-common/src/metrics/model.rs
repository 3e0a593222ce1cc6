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

use super::{BoxedCounter, BoxedGauge, RegistryOps};

/// Metrics of a reference-counted memory cache.
///
/// All counters share the `refcache_memory_op_total` vector and are distinguished by the `op` label.
#[derive(Debug)]
pub struct Metrics {
    /// Values admitted by `cache` without replacing an older entry.
    pub memory_insert: BoxedCounter,
    /// Values admitted by `cache` that displaced an older entry with the same key.
    pub memory_replace: BoxedCounter,
    /// Values refused by the admission check.
    pub memory_reject: BoxedCounter,
    /// `get` hits.
    pub memory_hit: BoxedCounter,
    /// `get` misses.
    pub memory_miss: BoxedCounter,
    /// Entries removed by `remove_all` or `clear`.
    pub memory_remove: BoxedCounter,
    /// Entries evicted to satisfy the cache budgets.
    pub memory_evict: BoxedCounter,
    /// Entries evicted by `trim`.
    pub memory_trim: BoxedCounter,
    /// Entries handed out by `reuse`.
    pub memory_reuse: BoxedCounter,
    /// Cached values released after they became orphaned and unreferenced.
    pub memory_release: BoxedCounter,
    /// Releases whose releaser reported a failure.
    pub memory_release_failure: BoxedCounter,

    /// Bytes of all tracked entries.
    pub memory_usage: BoxedGauge,
    /// Bytes of the tracked entries held by at least one client.
    pub memory_in_use_usage: BoxedGauge,
}

impl Metrics {
    /// Create a new metric with the given name.
    pub fn new<R>(name: &'static str, registry: &R) -> Self
    where
        R: RegistryOps + ?Sized,
    {
        let refcache_memory_op_total = registry.register_counter_vec(
            "refcache_memory_op_total",
            "refcache in-memory cache operations",
            &["name", "op"],
        );
        let refcache_memory_usage = registry.register_gauge_vec(
            "refcache_memory_usage",
            "refcache in-memory cache usage in bytes",
            &["name", "kind"],
        );

        let memory_insert = refcache_memory_op_total.counter(&[name, "insert"]);
        let memory_replace = refcache_memory_op_total.counter(&[name, "replace"]);
        let memory_reject = refcache_memory_op_total.counter(&[name, "reject"]);
        let memory_hit = refcache_memory_op_total.counter(&[name, "hit"]);
        let memory_miss = refcache_memory_op_total.counter(&[name, "miss"]);
        let memory_remove = refcache_memory_op_total.counter(&[name, "remove"]);
        let memory_evict = refcache_memory_op_total.counter(&[name, "evict"]);
        let memory_trim = refcache_memory_op_total.counter(&[name, "trim"]);
        let memory_reuse = refcache_memory_op_total.counter(&[name, "reuse"]);
        let memory_release = refcache_memory_op_total.counter(&[name, "release"]);
        let memory_release_failure = refcache_memory_op_total.counter(&[name, "release_failure"]);

        let memory_usage = refcache_memory_usage.gauge(&[name, "total"]);
        let memory_in_use_usage = refcache_memory_usage.gauge(&[name, "in_use"]);

        Self {
            memory_insert,
            memory_replace,
            memory_reject,
            memory_hit,
            memory_miss,
            memory_remove,
            memory_evict,
            memory_trim,
            memory_reuse,
            memory_release,
            memory_release_failure,
            memory_usage,
            memory_in_use_usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::registry::noop::NoopMetricsRegistry;

    fn case(registry: &impl RegistryOps) {
        let metrics = Metrics::new("test", registry);
        metrics.memory_insert.increase(1);
        metrics.memory_usage.absolute(1024);
    }

    #[test]
    fn test_metrics_noop() {
        case(&NoopMetricsRegistry);
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_metrics_prometheus() {
        use crate::metrics::registry::prometheus::PrometheusMetricsRegistry;

        let registry = prometheus::Registry::new();
        case(&PrometheusMetricsRegistry::new(registry.clone()));

        // One counter vector and one gauge vector.
        assert_eq!(registry.gather().len(), 2);
    }
}
