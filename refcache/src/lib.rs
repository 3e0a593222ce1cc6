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

//! refcache is a reference-counted memory cache for Rust.
//!
//! Values are shared through closeable, reference-counted handles that release the value exactly once. The cache
//! hands out client handles and only evicts the entries that no client uses.

use refcache_common as common;
use refcache_memory as memory;

mod prelude;
pub use prelude::*;
