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

use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};

use arc_swap::{ArcSwap, Guard};
use blockcache_common::{metrics::model::Metrics, strict_assert, strict_assert_ne};
use serde::{Deserialize, Serialize};

use self::{
    bucket::{BucketState, Slots},
    generation::Generation,
};
use crate::{key::BlockKey, record::Record};

pub mod bucket;
pub mod generation;
pub mod migrator;

/// A generation grows once the node count exceeds `buckets * GROW_LOAD_FACTOR`.
pub const GROW_LOAD_FACTOR: usize = 4;
/// A generation shrinks once the node count falls under `buckets / SHRINK_LOAD_DIVISOR`.
pub const SHRINK_LOAD_DIVISOR: usize = 2;
/// Inserts that leave a bucket longer than this count as overflows.
pub const OVERFLOW_BUCKET_LEN: usize = 16;
/// Upper bound of the bucket count.
pub const MAX_BUCKETS: usize = 1 << 24;

/// How buckets of a new generation are populated from the previous one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationMode {
    /// Buckets are populated by the first operation that touches them.
    Lazy,
    /// Like [`MigrationMode::Lazy`], plus a background thread that walks all buckets once.
    #[default]
    Background,
}

/// Resizable hash index of records.
///
/// The current generation is swapped atomically on resize. Operations that find a frozen bucket reload the current
/// generation and retry.
#[derive(Debug)]
pub struct Indexer {
    name: String,
    current: ArcSwap<Generation>,
    nodes: AtomicUsize,
    min_buckets: usize,
    mode: MigrationMode,
    grows: AtomicU64,
    shrinks: AtomicU64,
    metrics: Arc<Metrics>,
}

impl Indexer {
    /// Create an index with `buckets` initial buckets, which is also the floor for shrinking.
    pub fn new(name: impl Into<String>, buckets: usize, mode: MigrationMode, metrics: Arc<Metrics>) -> Self {
        let buckets = buckets.clamp(1, MAX_BUCKETS).next_power_of_two();
        metrics.index_buckets.absolute(buckets as u64);
        Self {
            name: name.into(),
            current: ArcSwap::from_pointee(Generation::new(buckets, metrics.clone())),
            nodes: AtomicUsize::new(0),
            min_buckets: buckets,
            mode,
            grows: AtomicU64::new(0),
            shrinks: AtomicU64::new(0),
            metrics,
        }
    }

    fn read<T>(&self, hash: u64, f: impl FnOnce(&Slots) -> T) -> T {
        self.read_from(self.current.load(), hash, f)
    }

    /// Run `f` on the bucket of `hash`, starting from `generation`.
    ///
    /// A frozen bucket has been migrated into a newer generation, so the current one is reloaded.
    fn read_from<T>(&self, mut generation: Guard<Arc<Generation>>, hash: u64, f: impl FnOnce(&Slots) -> T) -> T {
        loop {
            {
                let slots = generation.read(generation.index(hash));
                if slots.state != BucketState::Frozen {
                    return f(&slots);
                }
            }
            generation = self.current.load();
        }
    }

    fn write<T>(&self, hash: u64, f: impl FnOnce(&Generation, &mut Slots) -> T) -> T {
        self.write_from(self.current.load(), hash, f)
    }

    fn write_from<T>(
        &self,
        mut generation: Guard<Arc<Generation>>,
        hash: u64,
        f: impl FnOnce(&Generation, &mut Slots) -> T,
    ) -> T {
        loop {
            {
                let mut slots = generation.write(generation.index(hash));
                if slots.state != BucketState::Frozen {
                    return f(&generation, &mut slots);
                }
            }
            generation = self.current.load();
        }
    }

    /// Get the live record with `key` and take a reference on it.
    ///
    /// The reference is taken under the bucket lock, so the record cannot be removed in between.
    pub fn get(&self, hash: u64, key: &BlockKey) -> Option<Arc<Record>> {
        self.read(hash, |slots| {
            let record = slots.get(key).filter(|record| record.is_live())?;
            record.inc_refs(1);
            Some(record.clone())
        })
    }

    /// Get the live record with `key` without taking a reference.
    pub fn lookup(&self, hash: u64, key: &BlockKey) -> Option<Arc<Record>> {
        self.read(hash, |slots| slots.get(key).filter(|record| record.is_live()).cloned())
    }

    /// Take the implicit reference of the live record with `key`.
    ///
    /// `LIVE` is cleared under the bucket lock, so a concurrent replacement either happens before and is the
    /// record taken here, or happens after and finds nothing to take. The record stays in the index until its
    /// last reference is released.
    pub fn take(&self, hash: u64, key: &BlockKey) -> Option<Arc<Record>> {
        self.write(hash, |_, slots| {
            let record = slots.get(key).filter(|record| record.clear_live())?;
            Some(record.clone())
        })
    }

    /// Insert the record, returning the record it replaced if any.
    pub fn insert(&self, record: Arc<Record>) -> Option<Arc<Record>> {
        self.write(record.hash(), |generation, slots| {
            let old = slots.insert(record);
            strict_assert!(slots.is_sorted());
            if old.is_none() {
                self.nodes.fetch_add(1, Ordering::Relaxed);
                if slots.len() > OVERFLOW_BUCKET_LEN {
                    generation.add_overflow();
                }
            }
            old
        })
    }

    /// Remove the record from the index if it is dead and unreferenced.
    ///
    /// Both conditions are checked again under the bucket lock. Returns `true` if this call removed it.
    pub fn remove(&self, record: &Arc<Record>) -> bool {
        self.write(record.hash(), |_, slots| {
            if record.refs() != 0 || record.is_live() {
                return false;
            }
            let removed = slots.remove(record);
            if removed {
                self.nodes.fetch_sub(1, Ordering::Relaxed);
            }
            removed
        })
    }

    /// Take every record out of the index.
    ///
    /// The caller must guarantee that no resize happens concurrently.
    pub fn drain(&self) -> Vec<Arc<Record>> {
        let generation = self.current.load_full();
        let mut records = vec![];
        for id in 0..generation.len() {
            let mut slots = generation.write(id);
            strict_assert_ne!(slots.state, BucketState::Frozen);
            records.append(&mut slots.records);
        }
        self.nodes.fetch_sub(records.len(), Ordering::Relaxed);
        records
    }

    /// Publish a grown or shrunk generation if the current one crossed a threshold.
    pub fn maybe_resize(&self) {
        let generation = self.current.load_full();
        let len = generation.len();
        let nodes = self.nodes.load(Ordering::Relaxed);
        let overflows = generation.overflows();

        let grow = nodes > len * GROW_LOAD_FACTOR || overflows > (len / 8).max(1);
        let shrink = nodes < len / SHRINK_LOAD_DIVISOR && overflows == 0;

        let target = if grow && len < MAX_BUCKETS {
            len * 2
        } else if shrink && len > self.min_buckets {
            len / 2
        } else {
            return;
        };

        // Only the winner may replace the generation, so a stale generation never wins.
        if !generation.try_begin_resize() {
            return;
        }

        let successor = Arc::new(Generation::successor(generation, target));
        self.current.store(successor.clone());

        if target > len {
            self.grows.fetch_add(1, Ordering::Relaxed);
            self.metrics.index_grow.increase(1);
        } else {
            self.shrinks.fetch_add(1, Ordering::Relaxed);
            self.metrics.index_shrink.increase(1);
        }
        self.metrics.index_buckets.absolute(target as u64);
        tracing::debug!(
            "[indexer]: publish generation, buckets: {len} => {target}, nodes: {nodes}, overflows: {overflows}"
        );

        if self.mode == MigrationMode::Background {
            migrator::spawn(&self.name, successor);
        }
    }

    /// Count of records held by the buckets, including deleted records still referenced by handles.
    ///
    /// Replaced records leave their bucket at once and are not counted.
    pub fn nodes(&self) -> usize {
        self.nodes.load(Ordering::Relaxed)
    }

    /// Bucket count of the current generation.
    pub fn buckets(&self) -> usize {
        self.current.load().len()
    }

    /// Count of published grown generations.
    pub fn grows(&self) -> u64 {
        self.grows.load(Ordering::Relaxed)
    }

    /// Count of published shrunk generations.
    pub fn shrinks(&self) -> u64 {
        self.shrinks.load(Ordering::Relaxed)
    }

    /// Check the sort order of every bucket of the current generation.
    #[cfg(test)]
    pub fn is_sorted(&self) -> bool {
        let generation = self.current.load_full();
        (0..generation.len()).all(|id| generation.read(id).is_sorted())
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use itertools::Itertools;
    use rand::{rngs::SmallRng, RngCore, SeedableRng};

    use super::*;

    fn indexer(buckets: usize, mode: MigrationMode) -> Indexer {
        Indexer::new("test", buckets, mode, Arc::new(Metrics::noop()))
    }

    fn record(namespace: u64, key: u64) -> Arc<Record> {
        Arc::new(Record::new(
            BlockKey::new(namespace, key),
            key,
            Bytes::from(key.to_le_bytes().to_vec()),
            0,
        ))
    }

    fn kill(indexer: &Indexer, record: &Arc<Record>) -> bool {
        assert!(record.clear_live());
        record.dec_refs(1);
        indexer.remove(record)
    }

    #[test]
    fn test_indexer_get_insert_remove() {
        let indexer = indexer(4, MigrationMode::Lazy);
        let r = record(1, 42);
        assert!(indexer.insert(r.clone()).is_none());
        assert_eq!(indexer.nodes(), 1);

        let got = indexer.get(42, &BlockKey::new(1, 42)).unwrap();
        assert!(Arc::ptr_eq(&got, &r));
        assert_eq!(r.refs(), 2);
        assert!(indexer.get(42, &BlockKey::new(2, 42)).is_none());

        // Still referenced by the lookup above.
        assert!(!kill(&indexer, &r));
        assert!(indexer.lookup(42, &BlockKey::new(1, 42)).is_none());
        assert_eq!(indexer.nodes(), 1);

        r.dec_refs(1);
        assert!(indexer.remove(&r));
        assert!(!indexer.remove(&r));
        assert_eq!(indexer.nodes(), 0);
    }

    #[test]
    fn test_indexer_replace() {
        let indexer = indexer(4, MigrationMode::Lazy);
        let r1 = record(0, 7);
        let r2 = record(0, 7);
        indexer.insert(r1.clone());
        let old = indexer.insert(r2.clone()).unwrap();
        assert!(Arc::ptr_eq(&old, &r1));
        assert_eq!(indexer.nodes(), 1);

        // The replaced record is unreachable, removing it must not touch the new one.
        assert!(!kill(&indexer, &r1));
        assert_eq!(indexer.nodes(), 1);
        assert!(Arc::ptr_eq(&indexer.lookup(7, &BlockKey::new(0, 7)).unwrap(), &r2));
    }

    #[test]
    fn test_indexer_take() {
        let indexer = indexer(4, MigrationMode::Lazy);
        let key = BlockKey::new(0, 7);
        assert!(indexer.take(7, &key).is_none());

        let r1 = record(0, 7);
        indexer.insert(r1.clone());
        let taken = indexer.take(7, &key).unwrap();
        assert!(Arc::ptr_eq(&taken, &r1));
        assert!(!r1.is_live());
        // Only one caller may take the implicit reference.
        assert!(indexer.take(7, &key).is_none());
        assert_eq!(indexer.nodes(), 1);

        // A replacement installed after the take is live again.
        let r2 = record(0, 7);
        indexer.insert(r2.clone());
        assert!(Arc::ptr_eq(&indexer.take(7, &key).unwrap(), &r2));
    }

    #[test]
    fn test_indexer_retry_stale_generation() {
        let indexer = indexer(4, MigrationMode::Lazy);
        let key = BlockKey::new(0, 5);
        let r1 = record(0, 5);
        indexer.insert(r1.clone());

        let stale_read = indexer.current.load();
        let stale_write = indexer.current.load();
        indexer
            .current
            .store(Arc::new(Generation::successor(indexer.current.load_full(), 8)));
        // Migrating the target bucket freezes its source in the stale generation.
        drop(indexer.current.load().write(5));
        assert_eq!(stale_read.read(stale_read.index(5)).state, BucketState::Frozen);

        let found = indexer.read_from(stale_read, 5, |slots| slots.get(&key).cloned());
        assert!(Arc::ptr_eq(&found.unwrap(), &r1));

        let r2 = record(0, 5);
        let (len, old) = indexer.write_from(stale_write, 5, |generation, slots| {
            (generation.len(), slots.insert(r2.clone()))
        });
        assert_eq!(len, 8);
        assert!(Arc::ptr_eq(&old.unwrap(), &r1));
        assert!(Arc::ptr_eq(&indexer.lookup(5, &key).unwrap(), &r2));
    }

    fn test_resize(mode: MigrationMode) {
        let indexer = indexer(4, mode);
        let records = (0..1000).map(|key| record(key % 3, key)).collect_vec();

        for record in &records {
            indexer.insert(record.clone());
            indexer.maybe_resize();
        }
        assert!(indexer.grows() > 0);
        assert!(indexer.buckets() > 4);
        assert_eq!(indexer.nodes(), 1000);
        for record in &records {
            let found = indexer.lookup(record.hash(), record.key()).unwrap();
            assert!(Arc::ptr_eq(&found, record));
        }
        assert!(indexer.is_sorted());

        for record in &records[..990] {
            assert!(kill(&indexer, record));
            indexer.maybe_resize();
        }
        assert!(indexer.shrinks() > 0);
        assert_eq!(indexer.nodes(), 10);
        for record in &records[990..] {
            assert!(indexer.lookup(record.hash(), record.key()).is_some());
        }
        for record in &records[..990] {
            assert!(indexer.lookup(record.hash(), record.key()).is_none());
        }
        assert!(indexer.is_sorted());
    }

    #[test_log::test]
    fn test_indexer_resize_lazy() {
        test_resize(MigrationMode::Lazy);
    }

    #[test_log::test]
    fn test_indexer_resize_background() {
        test_resize(MigrationMode::Background);
    }

    #[test]
    fn test_indexer_overflow_grow() {
        let indexer = indexer(16, MigrationMode::Lazy);
        // Every key lands in bucket 0, far below the load factor threshold of 64 nodes.
        for key in 0..OVERFLOW_BUCKET_LEN as u64 + 2 {
            indexer.insert(record(0, key * 1024));
            indexer.maybe_resize();
        }
        assert_eq!(indexer.grows(), 0);

        // The third overflow exceeds the threshold of 16 / 8.
        indexer.insert(record(0, 1 << 20));
        indexer.maybe_resize();
        assert_eq!(indexer.grows(), 1);
        assert_eq!(indexer.buckets(), 32);
    }

    #[test]
    fn test_indexer_drain() {
        let indexer = indexer(2, MigrationMode::Lazy);
        for key in 0..100 {
            indexer.insert(record(0, key));
            indexer.maybe_resize();
        }
        let records = indexer.drain();
        assert_eq!(records.len(), 100);
        assert_eq!(indexer.nodes(), 0);
        assert!(indexer.lookup(1, &BlockKey::new(0, 1)).is_none());
    }

    #[test_log::test]
    fn test_indexer_concurrent_resize() {
        let indexer = Arc::new(indexer(1, MigrationMode::Background));
        let handles = (0..8)
            .map(|i| {
                let indexer = indexer.clone();
                std::thread::spawn(move || {
                    let mut rng = SmallRng::seed_from_u64(i);
                    let records = (0..2000).map(|_| record(i, rng.next_u64())).collect_vec();
                    for record in &records {
                        indexer.insert(record.clone());
                        indexer.maybe_resize();
                        let found = indexer.lookup(record.hash(), record.key()).unwrap();
                        assert!(Arc::ptr_eq(&found, record));
                    }
                    for record in &records {
                        assert!(kill(&indexer, record));
                        indexer.maybe_resize();
                    }
                })
            })
            .collect_vec();
        handles.into_iter().for_each(|handle| handle.join().unwrap());

        assert_eq!(indexer.nodes(), 0);
        assert!(indexer.grows() > 0);
        assert!(indexer.shrinks() > 0);
        assert!(indexer.is_sorted());
    }
}
