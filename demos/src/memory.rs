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

//! Cache, read, and reuse byte buffers.

use refcache::{CacheBuilder, CloseableReference, CountingMemoryCache, MemoryCacheParams, MemoryTrimType};

fn buffer(len: usize) -> CloseableReference<Vec<u8>> {
    CloseableReference::of(vec![0; len], |buf: Vec<u8>| {
        println!("Buffer of {} bytes is released.", buf.len());
        Ok(())
    })
}

/// Output:
///
/// ```plain
/// Buffer of 64 bytes is reused.
/// Buffer of 48 bytes is released.
/// Buffer of 32 bytes is released.
/// Buffer of 64 bytes is released.
/// ```
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cache: CountingMemoryCache<&str, Vec<u8>> = CacheBuilder::new(|buf: &Vec<u8>| buf.len())
        .with_name("buffers")
        .with_params(MemoryCacheParams {
            max_cache_size: 1024,
            max_cache_entries: 16,
            ..MemoryCacheParams::unbounded()
        })
        .build()?;

    for (key, len) in [("a", 64), ("b", 48), ("c", 32)] {
        let mut buf = buffer(len);
        if let Some(mut client) = cache.cache(key, &buf) {
            client.close()?;
        }
        buf.close()?;
    }

    let mut client = cache.get(&"a").expect("a is cached");
    assert_eq!(client.get().map(Vec::len), Some(64));
    assert!(cache.reuse(&"a").is_none());
    client.close()?;

    let mut reused = cache.reuse(&"a").expect("a is not in use");
    println!("Buffer of {} bytes is reused.", reused.get().map(Vec::len).unwrap_or_default());

    cache.trim(MemoryTrimType::OnAppBackgrounded);
    assert_eq!(cache.count(), 0);

    reused.close()?;
    Ok(())
}
