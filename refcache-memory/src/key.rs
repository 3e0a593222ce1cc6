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


use std::{borrow::Borrow, fmt::Display, sync::Arc};

use crate::cache::Key;

/// A cache key derived from a resource uri.
///
/// Several keys may derive from one uri, for example one per decoded size. Remove all of them with
/// [`matches_uri`] as the predicate of `remove_all`.
pub trait CacheKey: Key {
    /// The uri string the key derives from.
    fn uri(&self) -> &str;

    /// Returns `true` if the key derives from `uri`.
    fn contains_uri(&self, uri: &str) -> bool {
        self.uri().contains(uri)
    }
}

/// Build a predicate that matches the keys derived from `uri`.
pub fn matches_uri<K: CacheKey>(uri: &str) -> impl Fn(&K) -> bool + '_ {
    move |key: &K| key.contains_uri(uri)
}

/// A [`CacheKey`] that is the uri string itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringCacheKey(Arc<str>);

impl StringCacheKey {
    /// Create a key of `uri`.
    pub fn new(uri: impl Into<Arc<str>>) -> Self {
        Self(uri.into())
    }
}

impl CacheKey for StringCacheKey {
    fn uri(&self) -> &str {
        &self.0
    }
}

impl Display for StringCacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for StringCacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StringCacheKey {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for StringCacheKey {
    fn from(uri: String) -> Self {
        Self::new(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cache::CacheBuilder, raw::CountingMemoryCache, reference::CloseableReference};

    #[test]
    fn test_string_cache_key() {
        let key = StringCacheKey::from("https://img.example/a.png");
        assert_eq!(key.uri(), "https://img.example/a.png");
        assert_eq!(key.to_string(), "https://img.example/a.png");
        assert_eq!(key, StringCacheKey::new(String::from("https://img.example/a.png")));
        assert!(key.contains_uri("img.example/a.png"));
        assert!(!key.contains_uri("img.example/b.png"));
    }

    #[test_log::test]
    fn test_remove_all_of_uri() {
        let cache: CountingMemoryCache<StringCacheKey, String> =
            CacheBuilder::new(|v: &String| v.len()).build().unwrap();

        for key in ["a.png?w=64", "a.png?w=128", "b.png?w=64"] {
            let mut value = CloseableReference::of_drop(key.to_string());
            cache.cache(key.into(), &value).unwrap().close().unwrap();
            value.close().unwrap();
        }

        assert!(cache.contains(matches_uri::<StringCacheKey>("a.png")));
        assert_eq!(cache.remove_all(matches_uri::<StringCacheKey>("a.png")), 2);
        assert!(!cache.contains(matches_uri::<StringCacheKey>("a.png")));
        assert!(cache.contains_key(&"b.png?w=64".into()));
        assert_eq!(cache.count(), 1);
    }
}
