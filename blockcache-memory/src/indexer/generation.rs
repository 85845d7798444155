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
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use arc_swap::ArcSwapOption;
use blockcache_common::{metrics::model::Metrics, strict_assert};
use itertools::Itertools;
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use super::bucket::{Bucket, BucketState, Slots};
use crate::record::Record;

/// One complete bucket array of the index.
///
/// A successor generation starts with every bucket uninitialized. Each bucket is populated from the ancestor the
/// first time it is locked, which freezes the ancestor buckets it was built from. The ancestor link is dropped once
/// every bucket has been populated.
///
/// Locks are always taken on a newer generation before an older one.
pub struct Generation {
    buckets: Box<[Bucket]>,
    mask: usize,
    ancestor: ArcSwapOption<Generation>,
    migrated: AtomicUsize,
    resizing: AtomicBool,
    overflows: AtomicUsize,
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generation")
            .field("buckets", &self.buckets.len())
            .field("migrated", &self.migrated.load(Ordering::Relaxed))
            .field("migrating", &self.is_migrating())
            .field("overflows", &self.overflows.load(Ordering::Relaxed))
            .finish()
    }
}

impl Generation {
    /// Create the first generation with `len` empty buckets.
    pub fn new(len: usize, metrics: Arc<Metrics>) -> Self {
        strict_assert!(len.is_power_of_two());
        Self {
            buckets: (0..len).map(|_| Bucket::new(BucketState::Initialized)).collect(),
            mask: len - 1,
            ancestor: ArcSwapOption::empty(),
            migrated: AtomicUsize::new(len),
            resizing: AtomicBool::new(false),
            overflows: AtomicUsize::new(0),
            metrics,
        }
    }

    /// Create a generation with `len` buckets that migrates lazily from `ancestor`.
    pub fn successor(ancestor: Arc<Generation>, len: usize) -> Self {
        strict_assert!(len.is_power_of_two());
        let metrics = ancestor.metrics.clone();
        Self {
            buckets: (0..len).map(|_| Bucket::new(BucketState::Uninitialized)).collect(),
            mask: len - 1,
            ancestor: ArcSwapOption::new(Some(ancestor)),
            migrated: AtomicUsize::new(0),
            resizing: AtomicBool::new(false),
            overflows: AtomicUsize::new(0),
            metrics,
        }
    }

    /// Bucket count.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Bucket id of a hash.
    pub fn index(&self, hash: u64) -> usize {
        hash as usize & self.mask
    }

    /// Check if some buckets still wait to be populated from the ancestor.
    pub fn is_migrating(&self) -> bool {
        self.ancestor.load().is_some()
    }

    /// Claim the right to publish a successor. Only one caller ever wins per generation.
    pub fn try_begin_resize(&self) -> bool {
        self.resizing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record an insert that left its bucket longer than the overflow length.
    pub fn add_overflow(&self) {
        self.overflows.fetch_add(1, Ordering::Relaxed);
    }

    /// Count of inserts that overflowed a bucket of this generation.
    pub fn overflows(&self) -> usize {
        self.overflows.load(Ordering::Relaxed)
    }

    /// Lock the bucket for reading, populating it first if needed.
    pub fn read(&self, id: usize) -> RwLockReadGuard<'_, Slots> {
        {
            let slots = self.buckets[id].read();
            if slots.state != BucketState::Uninitialized {
                return slots;
            }
        }
        RwLockWriteGuard::downgrade(self.write(id))
    }

    /// Lock the bucket for writing, populating it first if needed.
    pub fn write(&self, id: usize) -> RwLockWriteGuard<'_, Slots> {
        let mut slots = self.buckets[id].write();
        if slots.state == BucketState::Uninitialized {
            self.migrate(id, &mut slots);
        }
        slots
    }

    fn migrate(&self, id: usize, slots: &mut Slots) {
        let records = match self.ancestor.load_full() {
            Some(ancestor) => ancestor.harvest(self.len(), id),
            None => {
                strict_assert!(false, "uninitialized bucket {id} without ancestor");
                vec![]
            }
        };

        slots.records = records;
        slots.state = BucketState::Initialized;
        strict_assert!(slots.is_sorted());

        self.metrics.index_migrate.increase(1);
        if self.migrated.fetch_add(1, Ordering::AcqRel) + 1 == self.len() {
            self.ancestor.store(None);
            tracing::debug!("[indexer]: migration to generation with {} buckets finished", self.len());
        }
    }

    /// Freeze the buckets that fold into bucket `id` of a generation with `len` buckets and collect their records.
    fn harvest(&self, len: usize, id: usize) -> Vec<Arc<Record>> {
        if len > self.len() {
            // Grow: one source bucket splits into several.
            let mask = len - 1;
            let mut slots = self.write(id & self.mask);
            slots.state = BucketState::Frozen;
            slots
                .records
                .iter()
                .filter(|record| record.hash() as usize & mask == id)
                .cloned()
                .collect()
        } else {
            // Shrink: several source buckets merge into one.
            (id..self.len())
                .step_by(len)
                .map(|src| {
                    let mut slots = self.write(src);
                    slots.state = BucketState::Frozen;
                    slots.records.clone()
                })
                .kmerge_by(|a, b| a.key() < b.key())
                .collect()
        }
    }

    /// Populate every bucket, stopping early once the migration is done.
    pub fn migrate_all(&self) {
        for id in 0..self.len() {
            if !self.is_migrating() {
                break;
            }
            drop(self.write(id));
        }
    }
}
