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

#[cfg(feature = "prometheus")]
pub use crate::common::metrics::registry::prometheus::PrometheusMetricsRegistry;
pub use crate::{
    common::{
        error::{Error as ReferenceError, ErrorKind, Result as ReferenceResult},
        metrics::{registry::noop::NoopMetricsRegistry, BoxedRegistry, RegistryOps},
    },
    memory::{
        live, matches_uri, CacheBuilder, CacheKey, CloseableReference, CountingLruMap, CountingMemoryCache,
        DefaultTrimStrategy, EntryStateObserver, Error, Key, MemoryCache, MemoryCacheCallback, MemoryCacheManager,
        MemoryCacheParams, MemoryTrimType, MemoryTrimmable, MultipleError, NoopMemoryCacheCallback, ParamsProvider,
        Releaser, Result, SharedReference, StringCacheKey, TrimStrategy, Value, Weighter, PARAMS_CHECK_INTERVAL,
    },
};
