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

use std::{
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
};

use bitflags::bitflags;
use parking_lot::Mutex;

use crate::{observer::EntryStateObserver, reference::CloseableReference};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Flags: u64 {
        /// The entry is no longer reachable from the cache by key.
        const ORPHAN = 0b00000001;
        /// The entry is queued for eviction.
        const IN_EXCLUSIVE = 0b00000010;
    }
}

/// [`Entry`] is the bookkeeping record of a cached value.
///
/// An entry is shared between the cache maps and the client handles it gave out. Its mutable fields are only
/// mutated while the cache lock is held. The atomics only make them readable without it.
pub(crate) struct Entry<K, V> {
    key: K,
    /// The cache's own handle of the value. Taken when the entry dies or is reused.
    value: Mutex<Option<CloseableReference<V>>>,
    observer: Option<Arc<dyn EntryStateObserver<K>>>,
    weight: usize,
    clients: AtomicUsize,
    flags: AtomicU64,
}

impl<K, V> Debug for Entry<K, V>
where
    K: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("weight", &self.weight)
            .field("clients", &self.clients())
            .field("flags", &Flags::from_bits_truncate(self.flags.load(Ordering::Acquire)))
            .finish()
    }
}

impl<K, V> Entry<K, V> {
    pub fn new(
        key: K,
        value: CloseableReference<V>,
        observer: Option<Arc<dyn EntryStateObserver<K>>>,
        weight: usize,
    ) -> Self {
        Self {
            key,
            value: Mutex::new(Some(value)),
            observer,
            weight,
            clients: AtomicUsize::new(0),
            flags: AtomicU64::new(0),
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// The weight of the value, taken once when the entry is created.
    pub fn weight(&self) -> usize {
        self.weight
    }

    pub fn observer(&self) -> Option<&Arc<dyn EntryStateObserver<K>>> {
        self.observer.as_ref()
    }

    /// Get a share of the value for a client handle.
    pub fn share(&self) -> Option<Arc<V>> {
        self.value.lock().as_ref().and_then(CloseableReference::share)
    }

    /// Take the cache's own handle of the value.
    pub fn take(&self) -> Option<CloseableReference<V>> {
        self.value.lock().take()
    }

    pub fn clients(&self) -> usize {
        self.clients.load(Ordering::Acquire)
    }

    /// Increase the client count and return the new count.
    pub fn inc_clients(&self) -> usize {
        let old = self.clients.fetch_add(1, Ordering::SeqCst);
        tracing::trace!("[entry]: inc clients: {} => {}", old, old + 1);
        old + 1
    }

    /// Decrease the client count and return the new count.
    ///
    /// # Panics
    ///
    /// Panics if the count is already zero.
    pub fn dec_clients(&self) -> usize {
        let old = self.clients.fetch_sub(1, Ordering::SeqCst);
        assert!(old > 0, "client count of a cache entry drops below zero");
        tracing::trace!("[entry]: dec clients: {} => {}", old, old - 1);
        old - 1
    }

    pub fn is_orphan(&self) -> bool {
        self.get_flags(Flags::ORPHAN, Ordering::Acquire)
    }

    /// # Panics
    ///
    /// Panics if the entry is already an orphan.
    pub fn set_orphan(&self) {
        let old = self.flags.fetch_or(Flags::ORPHAN.bits(), Ordering::AcqRel);
        assert!(
            old & Flags::ORPHAN.bits() == 0,
            "cache entry is made an orphan twice"
        );
    }

    pub fn is_in_exclusive(&self) -> bool {
        self.get_flags(Flags::IN_EXCLUSIVE, Ordering::Acquire)
    }

    pub fn set_in_exclusive(&self, val: bool) {
        self.set_flags(Flags::IN_EXCLUSIVE, val, Ordering::Release);
    }

    fn set_flags(&self, flags: Flags, val: bool, order: Ordering) {
        match val {
            true => self.flags.fetch_or(flags.bits(), order),
            false => self.flags.fetch_and(!flags.bits(), order),
        };
    }

    fn get_flags(&self, flags: Flags, order: Ordering) -> bool {
        self.flags.load(order) & flags.bits() == flags.bits()
    }
}
