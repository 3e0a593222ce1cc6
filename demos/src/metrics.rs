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

//! Export the cache metrics with prometheus.

use prometheus::{Encoder, Registry, TextEncoder};
use refcache::{CacheBuilder, CloseableReference, CountingMemoryCache, PrometheusMetricsRegistry};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let registry = Registry::new();
    let cache: CountingMemoryCache<u64, String> = CacheBuilder::new(|s: &String| s.len())
        .with_name("metrics")
        .with_metrics_registry(Box::new(PrometheusMetricsRegistry::new(registry.clone())))
        .build()?;
    tracing::info!("params: {}", serde_json::to_string(&cache.params())?);

    for key in 0..8u64 {
        let mut value = CloseableReference::of_drop(format!("value-{key}"));
        if let Some(mut client) = cache.cache(key, &value) {
            client.close()?;
        }
        value.close()?;
    }
    for key in 4..12u64 {
        if let Some(mut client) = cache.get(&key) {
            client.close()?;
        }
    }
    cache.remove_all(|key| key % 2 == 0);

    let mut buf = vec![];
    TextEncoder::new().encode(&registry.gather(), &mut buf)?;
    println!("{}", String::from_utf8(buf)?);
    Ok(())
}
