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

use blockcache_common::strict_assert;

/// Slot id of the sentinel node. A record whose slot is the sentinel is not in the list.
pub const SENTINEL: u32 = 0;

#[derive(Debug)]
struct Node<T> {
    prev: u32,
    next: u32,
    item: Option<T>,
}

/// A circular doubly linked list kept in an arena and linked by slot ids.
///
/// Slot 0 is the sentinel: `next` of the sentinel is the front (most recent) and `prev` the back (least recent).
/// Vacant slots are reused through a free list, so a slot id stays stable while its item is linked.
#[derive(Debug)]
pub struct RecencyList<T> {
    nodes: Vec<Node<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for RecencyList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecencyList<T> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                prev: SENTINEL,
                next: SENTINEL,
                item: None,
            }],
            free: vec![],
            len: 0,
        }
    }

    /// Number of linked items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert an item at the front and return its slot id.
    pub fn push_front(&mut self, item: T) -> u32 {
        let slot = match self.free.pop() {
            Some(slot) => {
                strict_assert!(self.nodes[slot as usize].item.is_none());
                self.nodes[slot as usize].item = Some(item);
                slot
            }
            None => {
                self.nodes.push(Node {
                    prev: SENTINEL,
                    next: SENTINEL,
                    item: Some(item),
                });
                (self.nodes.len() - 1) as u32
            }
        };
        self.link_front(slot);
        self.len += 1;
        slot
    }

    /// Move a linked item to the front.
    pub fn move_to_front(&mut self, slot: u32) {
        strict_assert!(self.contains(slot));
        if self.nodes[SENTINEL as usize].next == slot {
            return;
        }
        self.unlink(slot);
        self.link_front(slot);
    }

    /// Unlink the item in `slot` and vacate the slot.
    pub fn remove(&mut self, slot: u32) -> Option<T> {
        if !self.contains(slot) {
            return None;
        }
        self.unlink(slot);
        self.free.push(slot);
        self.len -= 1;
        self.nodes[slot as usize].item.take()
    }

    /// Remove the least recent item.
    pub fn pop_back(&mut self) -> Option<T> {
        match self.nodes[SENTINEL as usize].prev {
            SENTINEL => None,
            slot => self.remove(slot),
        }
    }

    /// Check if `slot` holds a linked item.
    pub fn contains(&self, slot: u32) -> bool {
        slot != SENTINEL && (slot as usize) < self.nodes.len() && self.nodes[slot as usize].item.is_some()
    }

    /// Iterate from the most recent item to the least recent one.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let mut cursor = self.nodes[SENTINEL as usize].next;
        std::iter::from_fn(move || {
            if cursor == SENTINEL {
                return None;
            }
            let node = &self.nodes[cursor as usize];
            cursor = node.next;
            node.item.as_ref()
        })
    }

    /// Remove every item, most recent first.
    pub fn drain(&mut self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len());
        while let Some(item) = self.pop_back() {
            items.push(item);
        }
        items.reverse();
        strict_assert!(self.is_empty());
        self.nodes.truncate(1);
        self.free.clear();
        items
    }

    fn link_front(&mut self, slot: u32) {
        let next = self.nodes[SENTINEL as usize].next;
        self.nodes[slot as usize].prev = SENTINEL;
        self.nodes[slot as usize].next = next;
        self.nodes[next as usize].prev = slot;
        self.nodes[SENTINEL as usize].next = slot;
    }

    fn unlink(&mut self, slot: u32) {
        let Node { prev, next, .. } = self.nodes[slot as usize];
        self.nodes[prev as usize].next = next;
        self.nodes[next as usize].prev = prev;
        self.nodes[slot as usize].prev = SENTINEL;
        self.nodes[slot as usize].next = SENTINEL;
    }
}
