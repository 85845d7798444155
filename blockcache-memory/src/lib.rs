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

//! A concurrent in-memory block cache for storage engines.
//!
//! Blocks are immutable byte payloads keyed by `(namespace, key)`, e.g. a file identifier and a block offset.
//!
//! - The index is a hash table whose bucket array is resized incrementally. A resize publishes a new generation
//!   and buckets move over one at a time, on first access or from a background thread, without blocking readers of
//!   other buckets.
//! - Every block is reference counted. [`Handle`]s returned by [`Cache::get`] keep a block readable and in the index
//!   until released, even after it has been deleted, replaced or evicted.
//! - A byte-budgeted LRU evicts the least recently used blocks that are not banned.
//!
//! ```rust
//! use blockcache_memory::CacheBuilder;
//!
//! let cache = CacheBuilder::new(1024).build().unwrap();
//! assert!(cache.set(1, 42, "block"));
//!
//! let handle = cache.get(1, 42).unwrap();
//! assert_eq!(handle.load().unwrap(), "block");
//! handle.release();
//!
//! assert!(cache.delete(1, 42));
//! cache.close(false);
//! ```

mod cache;
mod error;
mod eviction;
mod handle;
mod indexer;
mod key;
mod raw;
mod record;
mod stats;

mod prelude;
pub use prelude::*;
