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

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The interval to refresh [`MemoryCacheParams`] from its provider by default.
pub const PARAMS_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Capacity limits of a counting memory cache.
///
/// Sizes are in bytes, as reported by the cache weighter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryCacheParams {
    /// Max total size of the cached values, in use or not.
    pub max_cache_size: usize,
    /// Max count of the cached entries, in use or not.
    pub max_cache_entries: usize,
    /// Max total size of the exclusively owned entries.
    pub max_eviction_queue_size: usize,
    /// Max count of the exclusively owned entries.
    pub max_eviction_queue_entries: usize,
    /// Max size of a single value. Larger values are never cached.
    pub max_cache_entry_size: usize,
}

impl Default for MemoryCacheParams {
    /// 256 entries of at most 64 MiB in total, with no further limits.
    fn default() -> Self {
        Self {
            max_cache_size: 64 * 1024 * 1024,
            max_cache_entries: 256,
            max_eviction_queue_size: usize::MAX,
            max_eviction_queue_entries: usize::MAX,
            max_cache_entry_size: usize::MAX,
        }
    }
}

impl MemoryCacheParams {
    /// Params without any limit.
    pub fn unbounded() -> Self {
        Self {
            max_cache_size: usize::MAX,
            max_cache_entries: usize::MAX,
            max_eviction_queue_size: usize::MAX,
            max_eviction_queue_entries: usize::MAX,
            max_cache_entry_size: usize::MAX,
        }
    }
}

/// Source of the current [`MemoryCacheParams`], queried periodically by the cache.
///
/// The provider is always called out of the cache lock.
pub trait ParamsProvider: Fn() -> MemoryCacheParams + Send + Sync + 'static {}
impl<F> ParamsProvider for F where F: Fn() -> MemoryCacheParams + Send + Sync + 'static {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde() {
        let params = MemoryCacheParams {
            max_cache_size: 1024,
            max_cache_entries: 16,
            max_eviction_queue_size: 512,
            max_eviction_queue_entries: 8,
            max_cache_entry_size: 128,
        };
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"max_eviction_queue_entries\":8"));
        let decoded: MemoryCacheParams = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn test_defaults() {
        let params = MemoryCacheParams::default();
        assert_eq!(params.max_cache_entries, 256);
        assert_eq!(params.max_cache_entry_size, usize::MAX);
        assert_eq!(MemoryCacheParams::unbounded().max_cache_size, usize::MAX);
    }
}
