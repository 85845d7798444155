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

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::{key::BlockKey, record::Record};

/// Lifecycle of a bucket inside one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketState {
    /// Not populated yet. Populated from the ancestor generation on first access.
    Uninitialized,
    /// Populated and mutable.
    Initialized,
    /// Snapshot read by the migration of a newer generation. Never mutated again.
    Frozen,
}

/// Records of one bucket, sorted by key.
#[derive(Debug)]
pub struct Slots {
    pub state: BucketState,
    pub records: Vec<Arc<Record>>,
}

impl Slots {
    /// Binary search the position of `key`.
    pub fn search(&self, key: &BlockKey) -> Result<usize, usize> {
        self.records.binary_search_by(|record| record.key().cmp(key))
    }

    /// Get the record with `key`, live or not.
    pub fn get(&self, key: &BlockKey) -> Option<&Arc<Record>> {
        self.search(key).ok().map(|pos| &self.records[pos])
    }

    /// Insert the record, returning the record it replaced if the key was present.
    pub fn insert(&mut self, record: Arc<Record>) -> Option<Arc<Record>> {
        match self.search(record.key()) {
            Ok(pos) => Some(std::mem::replace(&mut self.records[pos], record)),
            Err(pos) => {
                self.records.insert(pos, record);
                None
            }
        }
    }

    /// Remove exactly `record` if it is still reachable from the bucket.
    pub fn remove(&mut self, record: &Arc<Record>) -> bool {
        match self.search(record.key()) {
            Ok(pos) if Arc::ptr_eq(&self.records[pos], record) => {
                self.records.remove(pos);
                true
            }
            _ => false,
        }
    }

    /// Number of records in the bucket.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the records are strictly sorted by key.
    pub fn is_sorted(&self) -> bool {
        self.records.windows(2).all(|w| w[0].key() < w[1].key())
    }
}

/// A hash slot guarded by its own lock.
#[derive(Debug)]
pub struct Bucket {
    slots: RwLock<Slots>,
}

impl Bucket {
    /// Create an empty bucket in the given state.
    pub fn new(state: BucketState) -> Self {
        Self {
            slots: RwLock::new(Slots { state, records: vec![] }),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Slots> {
        self.slots.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Slots> {
        self.slots.write()
    }
}
