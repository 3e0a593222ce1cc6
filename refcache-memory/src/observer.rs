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

/// Observer of the exclusivity of a cache entry.
///
/// An entry is exclusive while the cache is its only owner, which makes it a candidate for eviction and reuse.
/// The observer is called after the cache lock is released, so it may call back into the cache.
pub trait EntryStateObserver<K>: Send + Sync + 'static {
    /// Called when the entry of `key` becomes exclusive, or stops being exclusive.
    fn on_exclusivity_changed(&self, key: &K, is_exclusive: bool);
}

impl<K, F> EntryStateObserver<K> for F
where
    F: Fn(&K, bool) + Send + Sync + 'static,
{
    fn on_exclusivity_changed(&self, key: &K, is_exclusive: bool) {
        self(key, is_exclusive)
    }
}
