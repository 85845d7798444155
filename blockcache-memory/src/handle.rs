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

use arc_swap::ArcSwapOption;
use bytes::Bytes;

use crate::{key::BlockKey, raw::RawCacheInner, record::Record};

/// A caller-held reference to a cached block.
///
/// The handle keeps the record alive and pinned in the index until it is released, either explicitly with
/// [`Handle::release`] or by dropping it. Releasing more than once has no further effect.
pub struct Handle {
    inner: Arc<RawCacheInner>,
    record: ArcSwapOption<Record>,
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle").field("record", &*self.record.load()).finish()
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        self.release();
    }
}

impl Handle {
    /// Wrap a record the caller already took a reference on.
    pub(crate) fn new(inner: Arc<RawCacheInner>, record: Arc<Record>) -> Self {
        Self {
            inner,
            record: ArcSwapOption::new(Some(record)),
        }
    }

    /// Get the cached value, or `None` once the handle has been released.
    pub fn load(&self) -> Option<Bytes> {
        self.record.load().as_ref().map(|record| record.value().clone())
    }

    /// Get the key of the cached block, or `None` once the handle has been released.
    pub fn key(&self) -> Option<BlockKey> {
        self.record.load().as_ref().map(|record| *record.key())
    }

    /// Check if the handle has been released.
    pub fn is_released(&self) -> bool {
        self.record.load().is_none()
    }

    /// Give the reference back to the cache.
    ///
    /// Only the first call from any thread has an effect.
    pub fn release(&self) {
        if let Some(record) = self.record.swap(None) {
            self.inner.release(&record, 1);
        }
    }

    /// Name of the cache the handle comes from.
    pub fn cache_name(&self) -> &Cow<'static, str> {
        self.inner.name()
    }
}
