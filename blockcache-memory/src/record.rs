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

use std::{
    fmt::Debug,
    sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering},
};

use bitflags::bitflags;
use bytes::Bytes;

use crate::key::BlockKey;

bitflags! {
    /// Atomic state flags of a [`Record`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct Flags: u64 {
        /// The record still holds its implicit reference and is visible to lookups.
        const LIVE = 0b00000001;
        /// The record must never be tracked by the eviction policy again.
        const BANNED = 0b00000010;
    }
}

/// [`Record`] holds the information of a cached block.
///
/// The payload is immutable. Setting an existing key installs a new record.
///
/// `refs` counts outstanding handles, the implicit reference held while [`Flags::LIVE`] is set, and the reference
/// held by the eviction policy while the record is tracked.
pub struct Record {
    key: BlockKey,
    hash: u64,
    value: Bytes,
    refs: AtomicI32,
    flags: AtomicU64,
    /// Slot id in the recency list, 0 if untracked. Only mutated with the eviction lock held.
    slot: AtomicU32,
}

impl Debug for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Record")
            .field("key", &self.key)
            .field("hash", &self.hash)
            .field("size", &self.size())
            .field("refs", &self.refs())
            .field("flags", &Flags::from_bits_truncate(self.flags.load(Ordering::Relaxed)))
            .finish()
    }
}

impl Record {
    /// Create a live record.
    ///
    /// The record starts with the implicit reference plus `refs` extra references owned by the creator.
    pub fn new(key: BlockKey, hash: u64, value: Bytes, refs: i32) -> Self {
        Self {
            key,
            hash,
            value,
            refs: AtomicI32::new(1 + refs),
            flags: AtomicU64::new(Flags::LIVE.bits()),
            slot: AtomicU32::new(0),
        }
    }

    /// Get the record key.
    pub fn key(&self) -> &BlockKey {
        &self.key
    }

    /// Get the record hash.
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// Get the record value.
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Get the bytes billed against the cache capacity.
    pub fn size(&self) -> i64 {
        self.value.len() as i64
    }

    /// Check if the record still holds its implicit reference.
    pub fn is_live(&self) -> bool {
        self.get_flags(Flags::LIVE, Ordering::Acquire)
    }

    /// Clear the live flag.
    ///
    /// Returns `true` only for the caller that actually cleared it. That caller owns the implicit reference and
    /// must release it.
    pub fn clear_live(&self) -> bool {
        let old = self.flags.fetch_and(!Flags::LIVE.bits(), Ordering::SeqCst);
        old & Flags::LIVE.bits() != 0
    }

    /// Check if the record is banned from the eviction policy.
    pub fn is_banned(&self) -> bool {
        self.get_flags(Flags::BANNED, Ordering::Acquire)
    }

    /// Ban the record from the eviction policy.
    pub fn set_banned(&self) {
        self.set_flags(Flags::BANNED, true, Ordering::Release);
    }

    /// Set the record atomic flags.
    pub fn set_flags(&self, flags: Flags, val: bool, order: Ordering) {
        match val {
            true => self.flags.fetch_or(flags.bits(), order),
            false => self.flags.fetch_and(!flags.bits(), order),
        };
    }

    /// Get the record atomic flags.
    pub fn get_flags(&self, flags: Flags, order: Ordering) -> bool {
        self.flags.load(order) & flags.bits() == flags.bits()
    }

    pub(crate) fn slot(&self) -> u32 {
        self.slot.load(Ordering::Relaxed)
    }

    pub(crate) fn set_slot(&self, slot: u32) {
        self.slot.store(slot, Ordering::Relaxed);
    }

    /// Get the atomic reference count.
    pub fn refs(&self) -> i32 {
        self.refs.load(Ordering::Acquire)
    }

    /// Increase the atomic reference count.
    ///
    /// This function returns the new reference count after the op.
    pub fn inc_refs(&self, val: i32) -> i32 {
        let old = self.refs.fetch_add(val, Ordering::SeqCst);
        tracing::trace!(
            "[record]: inc record (key: {}) refs: {} => {}",
            self.key,
            old,
            old + val
        );
        old + val
    }

    /// Decrease the atomic reference count, saturating at zero.
    ///
    /// This function returns the new reference count after the op.
    pub fn dec_refs(&self, val: i32) -> i32 {
        let old = match self
            .refs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |refs| Some(refs.saturating_sub(val).max(0)))
        {
            Ok(old) | Err(old) => old,
        };
        let new = old.saturating_sub(val).max(0);
        tracing::trace!("[record]: dec record (key: {}) refs: {} => {}", self.key, old, new);
        new
    }

    /// Drop every reference at once, used when the cache is force closed.
    pub(crate) fn reset_refs(&self) {
        let old = self.refs.swap(0, Ordering::SeqCst);
        tracing::trace!("[record]: reset record (key: {}) refs: {} => 0", self.key, old);
    }
}
