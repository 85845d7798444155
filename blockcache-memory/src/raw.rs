// Copyright 2026 foyer Project Authors
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

use std::{borrow::Cow, sync::Arc};

use blockcache_common::{metrics::model::Metrics, scope::Scope};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::{
    error::SetError,
    eviction::{Eviction, EvictionConfig},
    handle::Handle,
    indexer::{Indexer, MigrationMode},
    key::BlockKey,
    record::Record,
    stats::{Counters, Stats},
};

pub struct RawCacheConfig {
    pub name: Cow<'static, str>,
    pub capacity: i64,
    pub buckets: usize,
    pub eviction_config: EvictionConfig,
    pub migration: MigrationMode,
    pub metrics: Arc<Metrics>,
}

/// Shared core of a cache.
///
/// Lock order: `closed` (read side for operations, write side for close), then a bucket lock or the eviction lock.
/// A bucket lock and the eviction lock are never held at the same time. Releasing a reference takes neither
/// `closed` nor the eviction lock.
pub(crate) struct RawCacheInner {
    name: Cow<'static, str>,
    closed: RwLock<bool>,
    indexer: Indexer,
    eviction: Mutex<Eviction>,
    counters: Counters,
    metrics: Arc<Metrics>,
}

impl RawCacheInner {
    pub fn name(&self) -> &Cow<'static, str> {
        &self.name
    }

    /// Drop `refs` references. The last one out of a dead record removes it from the index.
    pub fn release(&self, record: &Arc<Record>, refs: i32) {
        if record.dec_refs(refs) == 0 && !record.is_live() && self.indexer.remove(record) {
            self.metrics.memory_release.increase(1);
            tracing::trace!("[raw]: reclaim record (key: {})", record.key());
        }
    }

    /// Drop `refs` references, plus the implicit one if this call is the one that kills the record.
    fn retire(&self, record: &Arc<Record>, refs: i32) {
        let implicit = record.clear_live() as i32;
        self.release(record, refs + implicit);
    }

    fn promote(&self, record: &Arc<Record>) {
        let mut victims = vec![];
        let usage = self.eviction.lock().with(|mut eviction| {
            eviction.promote(record, &mut victims);
            eviction.usage()
        });
        self.metrics.memory_usage.absolute(usage.max(0) as u64);
        self.evict(victims);
    }

    /// Ban the record. Returns `true` if the eviction policy tracked it, the caller then owns its reference.
    fn ban(&self, record: &Arc<Record>) -> bool {
        let (tracked, usage) = self
            .eviction
            .lock()
            .with(|mut eviction| (eviction.ban(record), eviction.usage()));
        self.metrics.memory_usage.absolute(usage.max(0) as u64);
        tracked
    }

    fn evict(&self, victims: Vec<Arc<Record>>) {
        if victims.is_empty() {
            return;
        }
        let n = victims.len() as u64;
        Counters::inc(&self.counters.evictions, n);
        self.metrics.memory_evict.increase(n);
        tracing::debug!("[raw]: evict {n} records");
        for record in victims {
            self.retire(&record, 1);
        }
    }

    /// Kill a replaced record. Returns `false` if someone else killed it first.
    fn kill(&self, record: &Arc<Record>) -> bool {
        if !record.clear_live() {
            return false;
        }
        self.bury(record);
        true
    }

    /// Untrack a record whose `LIVE` flag the caller cleared, and drop the implicit reference.
    fn bury(&self, record: &Arc<Record>) {
        let tracked = self.ban(record) as i32;
        self.release(record, 1 + tracked);
    }
}

/// Non-generic cache working on precomputed hashes.
#[derive(Clone)]
pub struct RawCache {
    inner: Arc<RawCacheInner>,
}

impl std::fmt::Debug for RawCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawCache")
            .field("name", &self.inner.name)
            .field("stats", &self.stats())
            .finish()
    }
}

impl RawCache {
    pub fn new(config: RawCacheConfig) -> Self {
        let indexer = Indexer::new(
            config.name.to_string(),
            config.buckets,
            config.migration,
            config.metrics.clone(),
        );
        let eviction = Eviction::new(config.capacity, &config.eviction_config);
        let inner = RawCacheInner {
            name: config.name,
            closed: RwLock::new(false),
            indexer,
            eviction: Mutex::new(eviction),
            counters: Counters::default(),
            metrics: config.metrics,
        };
        Self { inner: Arc::new(inner) }
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "blockcache::memory::raw::get"))]
    pub fn get(&self, hash: u64, key: BlockKey) -> Option<Handle> {
        let closed = self.inner.closed.read();
        if *closed {
            return None;
        }

        match self.inner.indexer.get(hash, &key) {
            Some(record) => {
                Counters::inc(&self.inner.counters.hits, 1);
                self.inner.metrics.memory_hit.increase(1);
                self.inner.promote(&record);
                Some(Handle::new(self.inner.clone(), record))
            }
            None => {
                Counters::inc(&self.inner.counters.misses, 1);
                self.inner.metrics.memory_miss.increase(1);
                None
            }
        }
    }

    pub fn contains(&self, hash: u64, key: BlockKey) -> bool {
        let closed = self.inner.closed.read();
        !*closed && self.inner.indexer.lookup(hash, &key).is_some()
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "blockcache::memory::raw::set"))]
    pub fn try_set(&self, hash: u64, key: BlockKey, value: Bytes) -> Result<(), SetError> {
        let closed = self.inner.closed.read();
        if *closed {
            return Err(SetError::Closed);
        }

        if value.is_empty() {
            self.delete_inner(hash, key);
            self.inner.indexer.maybe_resize();
            return Ok(());
        }

        let size = value.len() as i64;
        let capacity = self.inner.eviction.lock().capacity();
        if size > capacity {
            return Err(SetError::TooLarge { size, capacity });
        }

        // One extra reference keeps the record alive until it has been promoted.
        let record = Arc::new(Record::new(key, hash, value, 1));
        match self.inner.indexer.insert(record.clone()) {
            Some(old) if self.inner.kill(&old) => self.inner.metrics.memory_replace.increase(1),
            _ => self.inner.metrics.memory_insert.increase(1),
        }
        self.inner.promote(&record);
        self.inner.release(&record, 1);

        self.inner.indexer.maybe_resize();
        Counters::inc(&self.inner.counters.sets, 1);
        Ok(())
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "blockcache::memory::raw::delete"))]
    pub fn delete(&self, hash: u64, key: BlockKey) -> bool {
        let closed = self.inner.closed.read();
        if *closed {
            return false;
        }
        let deleted = self.delete_inner(hash, key);
        self.inner.indexer.maybe_resize();
        deleted
    }

    fn delete_inner(&self, hash: u64, key: BlockKey) -> bool {
        let Some(record) = self.inner.indexer.take(hash, &key) else {
            return false;
        };
        self.inner.bury(&record);
        Counters::inc(&self.inner.counters.deletes, 1);
        self.inner.metrics.memory_remove.increase(1);
        true
    }

    /// Close the cache and evict every record.
    ///
    /// With `force`, every record is also taken out of the index and its references are zeroed, so leaked handles
    /// cannot keep anything in the index. A forced close after a plain one still reclaims.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "blockcache::memory::raw::close"))]
    pub fn close(&self, force: bool) {
        let mut closed = self.inner.closed.write();
        if *closed && !force {
            return;
        }
        *closed = true;

        let mut victims = vec![];
        self.inner.eviction.lock().clear(&mut victims);
        self.inner.metrics.memory_usage.absolute(0);
        let evicted = victims.len();
        for record in victims {
            self.inner.retire(&record, 1);
        }

        let mut drained = 0;
        if force {
            let records = self.inner.indexer.drain();
            drained = records.len();
            for record in records {
                record.clear_live();
                record.set_banned();
                record.reset_refs();
            }
            self.inner.metrics.memory_release.increase(drained as u64);
        }

        tracing::debug!(
            "[raw]: cache {} closed (force: {force}), evicted: {evicted}, drained: {drained}, nodes left: {}",
            self.inner.name,
            self.inner.indexer.nodes()
        );
    }

    #[cfg_attr(feature = "tracing", fastrace::trace(name = "blockcache::memory::raw::set_capacity"))]
    pub fn set_capacity(&self, capacity: i64) {
        let closed = self.inner.closed.read();
        if *closed {
            return;
        }

        let mut victims = vec![];
        let usage = self.inner.eviction.lock().with(|mut eviction| {
            eviction.set_capacity(capacity.max(0), &mut victims);
            eviction.usage()
        });
        self.inner.metrics.memory_usage.absolute(usage.max(0) as u64);
        self.inner.evict(victims);
    }

    pub fn stats(&self) -> Stats {
        let (usage, capacity) = self
            .inner
            .eviction
            .lock()
            .with(|eviction| (eviction.usage(), eviction.capacity()));
        let counters = &self.inner.counters;
        let indexer = &self.inner.indexer;
        Stats {
            nodes: self.nodes(),
            hits: Counters::get(&counters.hits),
            misses: Counters::get(&counters.misses),
            sets: Counters::get(&counters.sets),
            deletes: Counters::get(&counters.deletes),
            grows: indexer.grows(),
            shrinks: indexer.shrinks(),
            evictions: Counters::get(&counters.evictions),
            usage,
            capacity,
            buckets: indexer.buckets(),
        }
    }

    pub fn usage(&self) -> i64 {
        self.inner.eviction.lock().usage()
    }

    pub fn capacity(&self) -> i64 {
        self.inner.eviction.lock().capacity()
    }

    pub fn buckets(&self) -> usize {
        self.inner.indexer.buckets()
    }

    pub fn nodes(&self) -> usize {
        self.inner.indexer.nodes()
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.read()
    }

    pub fn name(&self) -> &Cow<'static, str> {
        &self.inner.name
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.inner.metrics
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use itertools::Itertools;
    use rand::{rngs::SmallRng, Rng, RngCore, SeedableRng};

    use super::*;
    use crate::eviction::lru::LruConfig;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<RawCache>();
        is_send_sync_static::<Handle>();
    }

    fn cache(capacity: i64, buckets: usize, migration: MigrationMode) -> RawCache {
        RawCache::new(RawCacheConfig {
            name: "test".into(),
            capacity,
            buckets,
            eviction_config: LruConfig::default().into(),
            migration,
            metrics: Arc::new(Metrics::noop()),
        })
    }

    fn key(key: u64) -> BlockKey {
        BlockKey::new(0, key)
    }

    fn set(cache: &RawCache, k: u64, size: usize) -> bool {
        cache.try_set(k, key(k), Bytes::from(vec![k as u8; size])).is_ok()
    }

    fn get(cache: &RawCache, k: u64) -> Option<Handle> {
        cache.get(k, key(k))
    }

    fn assert_tracked(cache: &RawCache, keys: &[u64]) {
        let tracked = cache.inner.eviction.lock().with(|eviction| match &*eviction {
            Eviction::Lru(lru) => lru.dump().iter().map(|r| r.key().key).collect_vec(),
        });
        assert_eq!(tracked, keys);
    }

    #[test]
    fn test_scenario_shrink_capacity() {
        let cache = cache(10, 16, MigrationMode::Lazy);
        for (k, size) in [(0, 1), (1, 2), (2, 1), (3, 1), (4, 1), (5, 1), (6, 1)] {
            assert!(set(&cache, k, size));
        }
        let stats = cache.stats();
        assert_eq!(stats.nodes, 7);
        assert_eq!(stats.usage, 8);
        assert_eq!(stats.evictions, 0);

        cache.set_capacity(7);
        assert_eq!(cache.usage(), 7);
        assert_eq!(cache.nodes(), 6);
        assert!(get(&cache, 0).is_none());
        assert!(get(&cache, 1).is_some());

        // The hit above promoted key 1, so keys 2, 3 and 4 go first.
        cache.set_capacity(4);
        assert_eq!(cache.usage(), 4);
        assert_tracked(&cache, &[1, 6, 5]);
        for k in 2..5 {
            assert!(get(&cache, k).is_none());
        }
        assert_eq!(cache.stats().evictions, 4);
        assert_eq!(cache.nodes(), 3);
    }

    #[test]
    fn test_eviction_order() {
        let cache = cache(3, 4, MigrationMode::Lazy);
        for k in 0..3 {
            assert!(set(&cache, k, 1));
        }
        drop(get(&cache, 0));
        assert!(set(&cache, 3, 1));

        assert!(get(&cache, 1).is_none());
        for k in [0, 2, 3] {
            assert!(get(&cache, k).is_some());
        }
        assert_eq!(cache.nodes(), 3);
    }

    #[test]
    fn test_handle_pins_evicted_value() {
        let cache = cache(2, 4, MigrationMode::Lazy);
        assert!(set(&cache, 0, 1));
        let handle = get(&cache, 0).unwrap();
        assert!(set(&cache, 1, 1));
        assert!(set(&cache, 2, 1));

        // Evicted but still referenced.
        assert!(get(&cache, 0).is_none());
        assert_eq!(cache.nodes(), 3);
        assert_eq!(cache.usage(), 2);
        assert_eq!(handle.load().unwrap(), Bytes::from(vec![0u8]));

        drop(handle);
        assert_eq!(cache.nodes(), 2);
    }

    #[test]
    fn test_double_release() {
        let cache = cache(10, 4, MigrationMode::Lazy);
        assert!(set(&cache, 0, 1));
        let handle = get(&cache, 0).unwrap();
        let record = cache.inner.indexer.lookup(0, &key(0)).unwrap();
        // implicit + eviction + handle
        assert_eq!(record.refs(), 3);

        handle.release();
        assert!(handle.is_released());
        assert_eq!(handle.load(), None);
        assert_eq!(record.refs(), 2);

        handle.release();
        drop(handle);
        assert_eq!(record.refs(), 2);
    }

    #[test]
    fn test_concurrent_release() {
        let cache = cache(10, 4, MigrationMode::Lazy);
        assert!(set(&cache, 0, 1));
        let handle = Arc::new(get(&cache, 0).unwrap());
        let record = cache.inner.indexer.lookup(0, &key(0)).unwrap();

        let threads = (0..8)
            .map(|_| {
                let handle = handle.clone();
                std::thread::spawn(move || handle.release())
            })
            .collect_vec();
        threads.into_iter().for_each(|t| t.join().unwrap());

        assert_eq!(record.refs(), 2);
    }

    #[test]
    fn test_replace_keeps_old_snapshot() {
        let cache = cache(10, 4, MigrationMode::Lazy);
        assert!(cache.try_set(0, key(0), Bytes::from_static(b"old")).is_ok());
        let old = get(&cache, 0).unwrap();

        assert!(cache.try_set(0, key(0), Bytes::from_static(b"newer")).is_ok());
        assert_eq!(old.load().unwrap(), Bytes::from_static(b"old"));
        assert_eq!(get(&cache, 0).unwrap().load().unwrap(), Bytes::from_static(b"newer"));
        assert_eq!(cache.nodes(), 1);
        assert_eq!(cache.usage(), 5);

        drop(old);
        assert_eq!(cache.nodes(), 1);
        assert_eq!(cache.usage(), 5);
        assert!(cache.contains(0, key(0)));
    }

    #[test]
    fn test_delete() {
        let cache = cache(10, 4, MigrationMode::Lazy);
        assert!(!cache.delete(0, key(0)));
        assert!(set(&cache, 0, 4));
        let handle = get(&cache, 0).unwrap();

        assert!(cache.delete(0, key(0)));
        assert!(!cache.delete(0, key(0)));
        assert!(get(&cache, 0).is_none());
        assert!(!cache.contains(0, key(0)));
        assert_eq!(cache.usage(), 0);
        assert_eq!(cache.nodes(), 1);
        assert_eq!(handle.load().unwrap().len(), 4);

        drop(handle);
        assert_eq!(cache.nodes(), 0);
        assert_eq!(cache.stats().deletes, 1);
    }

    #[test_log::test]
    fn test_delete_during_replacement() {
        let cache = cache(1024, 4, MigrationMode::Lazy);
        let stop = Arc::new(AtomicBool::new(false));
        let setters = (0..4u8)
            .map(|i| {
                let cache = cache.clone();
                let stop = stop.clone();
                std::thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        assert!(cache.try_set(7, key(7), Bytes::from(vec![i; 8])).is_ok());
                    }
                })
            })
            .collect_vec();

        // Setters only ever replace the key, so it is present from the set below until the delete.
        for _ in 0..2000 {
            assert!(set(&cache, 7, 8));
            assert!(cache.delete(7, key(7)));
        }

        stop.store(true, Ordering::Relaxed);
        setters.into_iter().for_each(|t| t.join().unwrap());
        cache.delete(7, key(7));
        assert!(!cache.contains(7, key(7)));
        assert_eq!(cache.nodes(), 0);
        assert_eq!(cache.usage(), 0);
    }

    #[test]
    fn test_set_rejections() {
        let cache = cache(10, 4, MigrationMode::Lazy);
        assert!(set(&cache, 0, 4));
        assert_eq!(
            cache.try_set(0, key(0), Bytes::from(vec![0; 11])),
            Err(SetError::TooLarge { size: 11, capacity: 10 })
        );
        // The previous value survives a rejected set.
        assert_eq!(get(&cache, 0).unwrap().load().unwrap().len(), 4);

        // Setting an empty value deletes the key.
        assert!(cache.try_set(0, key(0), Bytes::new()).is_ok());
        assert!(get(&cache, 0).is_none());
        assert!(cache.try_set(1, key(1), Bytes::new()).is_ok());
        assert_eq!(cache.nodes(), 0);

        cache.close(false);
        assert_eq!(cache.try_set(2, key(2), Bytes::from_static(b"v")), Err(SetError::Closed));
        assert!(!cache.delete(2, key(2)));
        assert!(get(&cache, 2).is_none());
    }

    #[test_log::test]
    fn test_close_reclaims() {
        let cache = cache(1024, 4, MigrationMode::Lazy);
        for k in 0..100 {
            assert!(set(&cache, k, 4));
        }
        let handles = (0..10).map(|k| get(&cache, k).unwrap()).collect_vec();

        cache.close(false);
        cache.close(false);
        assert!(cache.is_closed());
        assert_eq!(cache.usage(), 0);
        assert_eq!(cache.nodes(), 10);
        cache.set_capacity(1);
        assert_eq!(cache.capacity(), 1024);

        drop(handles);
        assert_eq!(cache.nodes(), 0);
    }

    #[test_log::test]
    fn test_force_close_with_leaked_handles() {
        let cache = cache(1024, 4, MigrationMode::Lazy);
        for k in 0..100 {
            assert!(set(&cache, k, 4));
        }
        let handles = (0..10).map(|k| get(&cache, k).unwrap()).collect_vec();

        cache.close(true);
        assert_eq!(cache.nodes(), 0);
        assert_eq!(cache.usage(), 0);

        // Leaked handles stay readable and releasing them later is harmless.
        assert!(handles.iter().all(|h| h.load().is_some()));
        drop(handles);
        assert_eq!(cache.nodes(), 0);
    }

    #[test_log::test]
    fn test_force_close_after_close() {
        let cache = cache(1024, 4, MigrationMode::Lazy);
        assert!(set(&cache, 0, 4));
        let handle = get(&cache, 0).unwrap();

        cache.close(false);
        assert_eq!(cache.nodes(), 1);
        cache.close(true);
        assert_eq!(cache.nodes(), 0);
        drop(handle);
        assert_eq!(cache.nodes(), 0);
    }

    #[test]
    fn test_capacity_invariant() {
        let cache = cache(256, 4, MigrationMode::Lazy);
        let mut rng = SmallRng::seed_from_u64(114514);
        for _ in 0..10000 {
            if rng.random_bool(0.01) {
                cache.set_capacity(rng.random_range(0..512));
            } else {
                let k = rng.random_range(0..1024);
                let size = rng.random_range(1..64);
                set(&cache, k, size);
            }
            assert!(cache.usage() <= cache.capacity());
        }
    }

    #[test_log::test]
    fn test_resize_preserves_values() {
        for migration in [MigrationMode::Lazy, MigrationMode::Background] {
            let cache = cache(1 << 20, 1, migration);
            for k in 0..2000 {
                assert!(set(&cache, k, 8));
            }
            assert!(cache.stats().grows > 0);
            for k in 0..2000 {
                let handle = get(&cache, k).unwrap();
                assert_eq!(handle.load().unwrap(), Bytes::from(vec![k as u8; 8]));
            }
            for k in 0..1990 {
                assert!(cache.delete(k, key(k)));
            }
            assert!(cache.stats().shrinks > 0);
            for k in 1990..2000 {
                assert_eq!(get(&cache, k).unwrap().load().unwrap(), Bytes::from(vec![k as u8; 8]));
            }
            assert!(cache.inner.indexer.is_sorted());
        }
    }

    #[test_log::test]
    fn test_fuzzy() {
        let cache = cache(4096, 4, MigrationMode::Background);
        let threads = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    let mut rng = SmallRng::seed_from_u64(i);
                    for _ in 0..20000 {
                        let k = rng.next_u64() % 4096;
                        match rng.random_range(0..10) {
                            0 => {
                                cache.delete(k, key(k));
                            }
                            1..=4 => {
                                if let Some(handle) = get(&cache, k) {
                                    assert_eq!(handle.key(), Some(key(k)));
                                    assert!(handle.load().unwrap().iter().all(|b| *b == k as u8));
                                }
                            }
                            _ => {
                                set(&cache, k, rng.random_range(1..32));
                            }
                        }
                    }
                })
            })
            .collect_vec();
        threads.into_iter().for_each(|t| t.join().unwrap());

        assert!(cache.usage() <= cache.capacity());
        cache.close(false);
        assert_eq!(cache.usage(), 0);
        assert_eq!(cache.nodes(), 0);
    }
}
