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

use blockcache_common::strict_assert;
use serde::{Deserialize, Serialize};

use super::list::{RecencyList, SENTINEL};
use crate::record::Record;

/// Lru eviction algorithm config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LruConfig {}

/// Byte budgeted least-recently-used policy.
///
/// Every tracked record holds one reference that is owned by the policy. Records handed back as victims still carry
/// that reference, and the caller must release it after the eviction lock is dropped.
#[derive(Debug)]
pub struct Lru {
    list: RecencyList<Arc<Record>>,
    usage: i64,
    capacity: i64,
}

impl Lru {
    /// Create an empty policy with the given capacity in bytes.
    pub fn new(capacity: i64, _: &LruConfig) -> Self {
        Self {
            list: RecencyList::new(),
            usage: 0,
            capacity,
        }
    }

    /// Bytes billed by tracked records.
    pub fn usage(&self) -> i64 {
        self.usage
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    /// Mark the record as the most recently used one, then evict until the usage fits the capacity.
    pub fn promote(&mut self, record: &Arc<Record>, victims: &mut Vec<Arc<Record>>) {
        if record.is_banned() {
            return;
        }

        match record.slot() {
            SENTINEL => {
                if !record.is_live() {
                    return;
                }
                record.inc_refs(1);
                let slot = self.list.push_front(record.clone());
                record.set_slot(slot);
                self.usage += record.size();
            }
            slot => {
                strict_assert!(self.list.contains(slot));
                self.list.move_to_front(slot);
            }
        }

        self.balance(victims);
    }

    /// Exclude the record from recency tracking for good.
    ///
    /// Returns `true` if the record was tracked. The caller then owns the reference the policy held.
    pub fn ban(&mut self, record: &Arc<Record>) -> bool {
        record.set_banned();
        match record.slot() {
            SENTINEL => false,
            slot => {
                let removed = self.list.remove(slot);
                strict_assert!(removed.as_ref().is_some_and(|r| Arc::ptr_eq(r, record)));
                record.set_slot(SENTINEL);
                self.usage -= record.size();
                true
            }
        }
    }

    /// Update the capacity and evict until the usage fits.
    pub fn set_capacity(&mut self, capacity: i64, victims: &mut Vec<Arc<Record>>) {
        self.capacity = capacity;
        self.balance(victims);
    }

    /// Evict the least recently used records while the usage exceeds the capacity.
    pub fn balance(&mut self, victims: &mut Vec<Arc<Record>>) {
        while self.usage > self.capacity {
            let Some(record) = self.list.pop_back() else {
                break;
            };
            self.untrack(&record);
            victims.push(record);
        }
    }

    /// Stop tracking every record.
    pub fn clear(&mut self, victims: &mut Vec<Arc<Record>>) {
        for record in self.list.drain() {
            self.untrack(&record);
            victims.push(record);
        }
        strict_assert!(self.usage == 0);
    }

    fn untrack(&mut self, record: &Arc<Record>) {
        record.set_banned();
        record.set_slot(SENTINEL);
        self.usage -= record.size();
    }

    #[cfg(test)]
    pub(crate) fn dump(&self) -> Vec<Arc<Record>> {
        self.list.iter().cloned().collect()
    }
}

#[cfg(test)]
pub mod tests {
    use bytes::Bytes;
    use itertools::Itertools;

    use super::*;
    use crate::key::BlockKey;

    fn record(key: u64, size: usize) -> Arc<Record> {
        Arc::new(Record::new(BlockKey::new(0, key), key, Bytes::from(vec![0; size]), 0))
    }

    fn keys(records: &[Arc<Record>]) -> Vec<u64> {
        records.iter().map(|r| r.key().key).collect_vec()
    }

    #[test]
    fn test_lru_promote_order() {
        let mut lru = Lru::new(100, &LruConfig::default());
        let rs = (0..4).map(|i| record(i, 1)).collect_vec();
        let mut victims = vec![];

        rs.iter().for_each(|r| lru.promote(r, &mut victims));
        assert_eq!(keys(&lru.dump()), vec![3, 2, 1, 0]);
        assert_eq!(lru.usage(), 4);
        assert!(rs.iter().all(|r| r.refs() == 2));

        lru.promote(&rs[1], &mut victims);
        assert_eq!(keys(&lru.dump()), vec![1, 3, 2, 0]);
        // Promoting a tracked record does not take another reference.
        assert_eq!(rs[1].refs(), 2);
        assert!(victims.is_empty());
    }

    #[test]
    fn test_lru_evict_least_recent() {
        let mut lru = Lru::new(3, &LruConfig::default());
        let rs = (0..4).map(|i| record(i, 1)).collect_vec();
        let mut victims = vec![];

        rs.iter().take(3).for_each(|r| lru.promote(r, &mut victims));
        lru.promote(&rs[0], &mut victims);
        lru.promote(&rs[3], &mut victims);

        assert_eq!(keys(&victims), vec![1]);
        assert!(victims[0].is_banned());
        assert_eq!(victims[0].slot(), SENTINEL);
        assert_eq!(keys(&lru.dump()), vec![3, 0, 2]);
        assert_eq!(lru.usage(), 3);

        // A stale promote of a victim is a noop.
        lru.promote(&rs[1], &mut victims);
        assert_eq!(keys(&lru.dump()), vec![3, 0, 2]);
    }

    #[test]
    fn test_lru_ban() {
        let mut lru = Lru::new(10, &LruConfig::default());
        let rs = (0..3).map(|i| record(i, 2)).collect_vec();
        let mut victims = vec![];
        rs.iter().for_each(|r| lru.promote(r, &mut victims));

        assert!(lru.ban(&rs[1]));
        assert!(!lru.ban(&rs[1]));
        assert_eq!(lru.usage(), 4);
        assert_eq!(keys(&lru.dump()), vec![2, 0]);

        lru.promote(&rs[1], &mut victims);
        assert_eq!(keys(&lru.dump()), vec![2, 0]);
    }

    #[test]
    fn test_lru_skip_dead_untracked() {
        let mut lru = Lru::new(10, &LruConfig::default());
        let r = record(0, 1);
        assert!(r.clear_live());
        let mut victims = vec![];
        lru.promote(&r, &mut victims);
        assert!(lru.dump().is_empty());
        assert_eq!(r.refs(), 1);
    }

    #[test]
    fn test_lru_set_capacity_and_clear() {
        let mut lru = Lru::new(10, &LruConfig::default());
        let rs = (0..5).map(|i| record(i, 2)).collect_vec();
        let mut victims = vec![];
        rs.iter().for_each(|r| lru.promote(r, &mut victims));
        assert_eq!(lru.usage(), 10);

        lru.set_capacity(5, &mut victims);
        assert_eq!(keys(&victims), vec![0, 1, 2]);
        assert_eq!(lru.usage(), 4);
        assert_eq!(lru.capacity(), 5);

        victims.clear();
        lru.clear(&mut victims);
        assert_eq!(keys(&victims), vec![4, 3]);
        assert_eq!(lru.usage(), 0);
        assert!(lru.dump().is_empty());
    }
}
