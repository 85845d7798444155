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

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Point-in-time counters of a cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Records held by the index buckets, including deleted or evicted records still held by handles.
    ///
    /// A replaced record leaves its bucket at once, so it is not counted even while a handle holds it.
    pub nodes: usize,
    /// Lookups that found a live record.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Accepted sets.
    pub sets: u64,
    /// Deletes that removed a live record.
    pub deletes: u64,
    /// Published grown index generations.
    pub grows: u64,
    /// Published shrunk index generations.
    pub shrinks: u64,
    /// Records evicted by the recency policy.
    pub evictions: u64,
    /// Bytes billed against the capacity.
    pub usage: i64,
    /// Capacity in bytes.
    pub capacity: i64,
    /// Bucket count of the current index generation.
    pub buckets: usize,
}

impl Stats {
    /// Ratio of hits among all lookups, 0 if there was no lookup.
    pub fn hit_ratio(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub sets: AtomicU64,
    pub deletes: AtomicU64,
    pub evictions: AtomicU64,
}

impl Counters {
    pub fn inc(counter: &AtomicU64, val: u64) {
        counter.fetch_add(val, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
