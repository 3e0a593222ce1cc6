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

pub use crate::{
    cache::{CacheBuilder, Key, MemoryCache, Value},
    error::{Error, MultipleError, Result},
    key::{matches_uri, CacheKey, StringCacheKey},
    lru_map::{CountingLruMap, Weighter},
    manager::{MemoryCacheCallback, MemoryCacheManager, NoopMemoryCacheCallback},
    observer::EntryStateObserver,
    params::{MemoryCacheParams, ParamsProvider, PARAMS_CHECK_INTERVAL},
    raw::CountingMemoryCache,
    reference::{live, CloseableReference, Releaser, SharedReference},
    trim::{DefaultTrimStrategy, MemoryTrimType, MemoryTrimmable, TrimStrategy},
};
