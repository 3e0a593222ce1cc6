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

//! Watch entries move in and out of the eviction queue.

use refcache::{CacheBuilder, CloseableReference, CountingMemoryCache, MemoryCacheParams};

/// Output:
///
/// ```plain
/// Entry [key = 1] is exclusive: true.
/// Entry [key = 1] is exclusive: false.
/// Entry [key = 1] is exclusive: true.
/// Entry [key = 2] is exclusive: true.
/// Entry [key = 1] is exclusive: false.
/// ```
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cache: CountingMemoryCache<u64, String> = CacheBuilder::new(|s: &String| s.len())
        .with_params(MemoryCacheParams {
            max_cache_entries: 16,
            max_eviction_queue_entries: 1,
            ..MemoryCacheParams::unbounded()
        })
        .build()?;

    let echo = |key: &u64, is_exclusive: bool| println!("Entry [key = {key}] is exclusive: {is_exclusive}.");

    let mut first = CloseableReference::of_drop("First".to_string());
    let mut client = cache.cache_with_observer(1, &first, echo).expect("admitted");
    first.close()?;
    client.close()?;

    let mut client = cache.get(&1).expect("cached");
    client.close()?;

    // The eviction queue holds one entry, so caching the second evicts the first.
    let mut second = CloseableReference::of_drop("Second".to_string());
    let mut client = cache.cache_with_observer(2, &second, echo).expect("admitted");
    second.close()?;
    client.close()?;

    assert!(!cache.contains_key(&1));
    Ok(())
}
