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

//! Fuzzy test for the counting memory cache.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use itertools::Itertools;
use parking_lot::Mutex;
use rand::{rngs::SmallRng, Rng, SeedableRng};
use refcache::{CacheBuilder, CloseableReference, CountingMemoryCache, MemoryCacheParams, MemoryTrimType};

const WORKERS: usize = 8;
const OPS: usize = 5000;
const KEYS: u64 = 64;
const HOLD: usize = 8;

#[derive(Debug)]
struct Block {
    id: u64,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct Ledger {
    created: AtomicU64,
    released: Mutex<Vec<u64>>,
}

impl Ledger {
    fn block(self: &Arc<Self>, rng: &mut SmallRng) -> CloseableReference<Block> {
        let id = self.created.fetch_add(1, Ordering::SeqCst);
        let block = Block {
            id,
            data: vec![id as u8; rng.random_range(16..=256)],
        };
        let ledger = self.clone();
        CloseableReference::of(block, move |block: Block| {
            ledger.released.lock().push(block.id);
            Ok(())
        })
    }
}

fn worker(cache: CountingMemoryCache<u64, Block>, ledger: Arc<Ledger>, seed: u64) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut held: Vec<(u64, CloseableReference<Block>)> = vec![];

    for _ in 0..OPS {
        let key = rng.random_range(0..KEYS);
        match rng.random_range(0..100) {
            0..40 => {
                let mut block = ledger.block(&mut rng);
                if let Some(client) = cache.cache(key, &block) {
                    assert!(client.ptr_eq(&block));
                    held.push((key, client));
                }
                block.close().unwrap();
            }
            40..80 => {
                if let Some(client) = cache.get(&key) {
                    let block = client.get().unwrap();
                    assert_eq!(block.data.len(), block.data.iter().filter(|b| **b == block.id as u8).count());
                    held.push((key, client));
                }
            }
            80..88 => {
                if let Some(mut reused) = cache.reuse(&key) {
                    assert!(reused.get().is_some());
                    reused.close().unwrap();
                }
            }
            88..94 => {
                cache.remove_all(|k| k / 8 == key / 8);
            }
            94..98 => cache.trim(MemoryTrimType::OnCloseToHeapLimit),
            _ => cache.trim(MemoryTrimType::OnAppBackgrounded),
        }

        while held.len() > HOLD {
            let (_, mut client) = held.swap_remove(rng.random_range(0..held.len()));
            client.close().unwrap();
        }
    }

    CloseableReference::close_all(held.into_iter().map(|(_, client)| Some(client))).unwrap();
}

fn run(params: MemoryCacheParams) {
    let ledger = Arc::new(Ledger::default());
    let cache: CountingMemoryCache<u64, Block> = CacheBuilder::new(|block: &Block| block.data.len())
        .with_name("fuzzy")
        .with_params(params)
        .with_params_check_interval(Duration::from_millis(1))
        .build()
        .unwrap();

    let handles = (0..WORKERS as u64)
        .map(|seed| {
            let cache = cache.clone();
            let ledger = ledger.clone();
            std::thread::spawn(move || worker(cache, ledger, seed))
        })
        .collect_vec();
    handles.into_iter().for_each(|handle| handle.join().unwrap());

    assert_eq!(cache.in_use_count(), 0);
    assert_eq!(cache.in_use_size_in_bytes(), 0);
    assert_eq!(cache.eviction_queue_count(), cache.count());
    assert_eq!(cache.eviction_queue_size_in_bytes(), cache.size_in_bytes());
    assert!(cache.count() <= params.max_cache_entries);
    assert!(cache.size_in_bytes() <= params.max_cache_size);
    assert!(cache.eviction_queue_count() <= params.max_eviction_queue_entries);
    assert!(cache.eviction_queue_size_in_bytes() <= params.max_eviction_queue_size);

    let cached = cache.count() as u64;
    let released = ledger.released.lock().len() as u64;
    assert_eq!(released + cached, ledger.created.load(Ordering::SeqCst));

    drop(cache);
    let mut released = ledger.released.lock().clone();
    released.sort();
    assert_eq!(released, (0..ledger.created.load(Ordering::SeqCst)).collect_vec());
}

#[test_log::test]
fn test_counting_cache_fuzzy_tight() {
    run(MemoryCacheParams {
        max_cache_size: 4 * 1024,
        max_cache_entries: 32,
        max_eviction_queue_size: 2 * 1024,
        max_eviction_queue_entries: 16,
        max_cache_entry_size: 256,
    })
}

#[test_log::test]
fn test_counting_cache_fuzzy_loose() {
    run(MemoryCacheParams {
        max_cache_size: 1024 * 1024,
        max_cache_entries: 1024,
        ..MemoryCacheParams::unbounded()
    })
}

#[test_log::test]
fn test_observer_tracks_exclusivity() {
    let ledger = Arc::new(Ledger::default());
    let exclusive = Arc::new(Mutex::new(std::collections::HashSet::new()));
    // Nothing is evicted, so only the owner of a key changes its exclusivity.
    let cache: CountingMemoryCache<u64, Block> = CacheBuilder::new(|block: &Block| block.data.len())
        .with_params(MemoryCacheParams::unbounded())
        .build()
        .unwrap();

    let handles = (0..WORKERS as u64)
        .map(|seed| {
            let cache = cache.clone();
            let ledger = ledger.clone();
            let exclusive = exclusive.clone();
            std::thread::spawn(move || {
                let mut rng = SmallRng::seed_from_u64(seed);
                // Every worker owns its keys, so the notifications of a key are ordered.
                let keys = (0..8).map(|i| seed * 8 + i).collect_vec();
                for _ in 0..500 {
                    let key = keys[rng.random_range(0..keys.len())];
                    let mut block = ledger.block(&mut rng);
                    let exclusive = exclusive.clone();
                    let client = cache.cache_with_observer(key, &block, move |key: &u64, is_exclusive: bool| {
                        let mut exclusive = exclusive.lock();
                        match is_exclusive {
                            true => assert!(exclusive.insert(*key)),
                            false => assert!(exclusive.remove(key)),
                        }
                    });
                    block.close().unwrap();
                    if let Some(mut client) = client {
                        client.close().unwrap();
                    }
                    if rng.random_bool(0.3) {
                        if let Some(mut client) = cache.get(&key) {
                            client.close().unwrap();
                        }
                    }
                }
            })
        })
        .collect_vec();
    handles.into_iter().for_each(|handle| handle.join().unwrap());

    assert_eq!(exclusive.lock().len(), cache.eviction_queue_count());
    cache.clear();
    assert!(exclusive.lock().is_empty());
}
