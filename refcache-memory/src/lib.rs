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

//! This crate provides a reference-counted LRU memory cache, and the closeable references it is built on.
//!
//! A cached value is shared through [`CloseableReference`] handles. The cache keeps its own handle of every value
//! it admitted, and hands out client handles on [`CountingMemoryCache::cache`] and [`CountingMemoryCache::get`].
//! An entry becomes a candidate for eviction only after all of its client handles are closed.

mod cache;
mod entry;
mod error;
mod key;
mod lru_map;
mod manager;
mod observer;
mod params;
mod raw;
mod reference;
mod trim;

mod prelude;
pub use prelude::*;
