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

use std::borrow::Cow;

use super::{BoxedCounter, BoxedGauge, RegistryOps};

/// Metrics reported by a block cache instance.
///
/// All metrics carry a `name` label so that multiple caches can share one registry.
#[derive(Debug)]
pub struct Metrics {
    /* in-memory cache metrics */
    /// Inserts of keys that were absent.
    pub memory_insert: BoxedCounter,
    /// Inserts that replaced a present key.
    pub memory_replace: BoxedCounter,
    /// Lookup hits.
    pub memory_hit: BoxedCounter,
    /// Lookup misses.
    pub memory_miss: BoxedCounter,
    /// Explicit deletes.
    pub memory_remove: BoxedCounter,
    /// Entries evicted by the recency policy.
    pub memory_evict: BoxedCounter,
    /// Entries reclaimed from the index after the last reference was released.
    pub memory_release: BoxedCounter,

    /// Bytes billed against the capacity.
    pub memory_usage: BoxedGauge,

    /* index metrics */
    /// Generations published by growing the bucket array.
    pub index_grow: BoxedCounter,
    /// Generations published by shrinking the bucket array.
    pub index_shrink: BoxedCounter,
    /// Buckets migrated from an ancestor generation.
    pub index_migrate: BoxedCounter,

    /// Bucket count of the current generation.
    pub index_buckets: BoxedGauge,
}

impl Metrics {
    /// Create a new metric with the given name.
    pub fn new(name: impl Into<Cow<'static, str>>, registry: &dyn RegistryOps) -> Self {
        let name = name.into();

        let blockcache_memory_op_total = registry.register_counter_vec(
            "blockcache_memory_op_total",
            "blockcache in-memory cache operations",
            &["name", "op"],
        );
        let blockcache_memory_usage =
            registry.register_gauge_vec("blockcache_memory_usage", "blockcache in-memory cache usage", &["name"]);

        let counter = |op: &'static str| blockcache_memory_op_total.counter(&[name.clone(), op.into()]);

        let memory_insert = counter("insert");
        let memory_replace = counter("replace");
        let memory_hit = counter("hit");
        let memory_miss = counter("miss");
        let memory_remove = counter("remove");
        let memory_evict = counter("evict");
        let memory_release = counter("release");

        let memory_usage = blockcache_memory_usage.gauge(&[name.clone()]);

        let blockcache_index_op_total = registry.register_counter_vec(
            "blockcache_index_op_total",
            "blockcache index resize operations",
            &["name", "op"],
        );
        let blockcache_index_buckets =
            registry.register_gauge_vec("blockcache_index_buckets", "blockcache index bucket count", &["name"]);

        let index_grow = blockcache_index_op_total.counter(&[name.clone(), "grow".into()]);
        let index_shrink = blockcache_index_op_total.counter(&[name.clone(), "shrink".into()]);
        let index_migrate = blockcache_index_op_total.counter(&[name.clone(), "migrate".into()]);

        let index_buckets = blockcache_index_buckets.gauge(&[name]);

        Self {
            memory_insert,
            memory_replace,
            memory_hit,
            memory_miss,
            memory_remove,
            memory_evict,
            memory_release,
            memory_usage,
            index_grow,
            index_shrink,
            index_migrate,
            index_buckets,
        }
    }

    /// Build noop metrics.
    ///
    /// Note: `noop` is only supposed to be called by other blockcache components.
    #[doc(hidden)]
    pub fn noop() -> Self {
        use super::registry::noop::NoopMetricsRegistry;

        Self::new("test", &NoopMetricsRegistry)
    }
}
