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

use std::{borrow::Cow, fmt::Debug, sync::Arc};

use blockcache_common::{
    code::{DefaultHashBuilder, HashBuilder},
    error::{Error, Result},
    metrics::{model::Metrics, registry::noop::NoopMetricsRegistry, BoxedRegistry, RegistryOps},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    error::SetError,
    eviction::EvictionConfig,
    handle::Handle,
    indexer::{MigrationMode, MAX_BUCKETS},
    key::BlockKey,
    raw::{RawCache, RawCacheConfig},
    stats::Stats,
};

/// Default shard count, which is also the initial and minimal bucket count of the index.
pub const DEFAULT_SHARDS: usize = 16;

/// Serializable configuration of a [`Cache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name of the cache, used as the metrics label and in thread names.
    pub name: String,
    /// Capacity in bytes.
    pub capacity: i64,
    /// Parallelism factor, rounded up to a power of two for the initial bucket count.
    pub shards: usize,
    /// Eviction algorithm.
    pub eviction: EvictionConfig,
    /// Index migration mode.
    pub migration: MigrationMode,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "blockcache".to_string(),
            capacity: 64 * 1024 * 1024,
            shards: DEFAULT_SHARDS,
            eviction: EvictionConfig::default(),
            migration: MigrationMode::default(),
        }
    }
}

/// In-memory block cache builder.
pub struct CacheBuilder<S = DefaultHashBuilder> {
    name: Cow<'static, str>,
    capacity: i64,
    shards: usize,
    eviction_config: Result<EvictionConfig>,
    hash_builder: S,
    migration: MigrationMode,
    registry: BoxedRegistry,
}

impl<S> Debug for CacheBuilder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("shards", &self.shards)
            .field("eviction_config", &self.eviction_config)
            .field("migration", &self.migration)
            .finish()
    }
}

impl CacheBuilder {
    /// Create a cache builder with the capacity in bytes.
    pub fn new(capacity: i64) -> Self {
        Self {
            name: "blockcache".into(),
            capacity,
            shards: DEFAULT_SHARDS,
            eviction_config: Ok(EvictionConfig::default()),
            hash_builder: DefaultHashBuilder::default(),
            migration: MigrationMode::default(),
            registry: Box::new(NoopMetricsRegistry),
        }
    }

    /// Create a cache builder from a serializable config.
    pub fn from_config(config: CacheConfig) -> Self {
        Self::new(config.capacity)
            .with_name(config.name)
            .with_shards(config.shards)
            .with_eviction_config(config.eviction)
            .with_migration_mode(config.migration)
    }
}

impl<S> CacheBuilder<S>
where
    S: HashBuilder,
{
    /// Set the name of the cache, used as the metrics label.
    ///
    /// Default: `blockcache`.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the parallelism factor. The index starts with this many buckets rounded up to a power of two, and never
    /// shrinks below it.
    ///
    /// Default: 16.
    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    /// Set the eviction algorithm.
    pub fn with_eviction_config(mut self, eviction_config: impl Into<EvictionConfig>) -> Self {
        self.eviction_config = Ok(eviction_config.into());
        self
    }

    /// Set the eviction algorithm by name. An unknown name fails [`CacheBuilder::build`].
    pub fn with_eviction_strategy(mut self, strategy: &str) -> Self {
        self.eviction_config = strategy.parse();
        self
    }

    /// Set the hash builder used for bucket placement.
    pub fn with_hash_builder<OS>(self, hash_builder: OS) -> CacheBuilder<OS>
    where
        OS: HashBuilder,
    {
        CacheBuilder {
            name: self.name,
            capacity: self.capacity,
            shards: self.shards,
            eviction_config: self.eviction_config,
            hash_builder,
            migration: self.migration,
            registry: self.registry,
        }
    }

    /// Set how buckets are migrated after the index is resized.
    ///
    /// Default: [`MigrationMode::Background`].
    pub fn with_migration_mode(mut self, migration: MigrationMode) -> Self {
        self.migration = migration;
        self
    }

    /// Set the metrics registry.
    ///
    /// Default: [`NoopMetricsRegistry`].
    pub fn with_metrics_registry(mut self, registry: impl RegistryOps) -> Self {
        self.registry = Box::new(registry);
        self
    }

    /// Build the cache.
    pub fn build(self) -> Result<Cache<S>> {
        let eviction_config = self.eviction_config?;
        if self.capacity <= 0 {
            return Err(Error::config("capacity must be greater than zero").with_context("capacity", self.capacity));
        }
        if self.shards == 0 || self.shards > MAX_BUCKETS {
            return Err(
                Error::config(format!("shards must be in 1..={MAX_BUCKETS}")).with_context("shards", self.shards)
            );
        }

        let metrics = Arc::new(Metrics::new(self.name.clone(), self.registry.as_ref()));
        let raw = RawCache::new(RawCacheConfig {
            name: self.name,
            capacity: self.capacity,
            buckets: self.shards.next_power_of_two(),
            eviction_config,
            migration: self.migration,
            metrics,
        });

        Ok(Cache {
            raw,
            hash_builder: Arc::new(self.hash_builder),
        })
    }
}

/// Concurrent in-memory cache of immutable blocks keyed by `(namespace, key)`.
///
/// The cache is cheap to clone; all clones share the same state.
pub struct Cache<S = DefaultHashBuilder> {
    raw: RawCache,
    hash_builder: Arc<S>,
}

impl<S> Debug for Cache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache").field("raw", &self.raw).finish()
    }
}

impl<S> Clone for Cache<S> {
    fn clone(&self) -> Self {
        Self {
            raw: self.raw.clone(),
            hash_builder: self.hash_builder.clone(),
        }
    }
}

impl<S> Cache<S>
where
    S: HashBuilder,
{
    fn hash(&self, key: &BlockKey) -> u64 {
        self.hash_builder.hash_one(key)
    }

    /// Get the cached block. A hit promotes it to the most recently used position.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "blockcache::memory::cache::get"))]
    pub fn get(&self, namespace: u64, key: u64) -> Option<Handle> {
        let key = BlockKey::new(namespace, key);
        self.raw.get(self.hash(&key), key)
    }

    /// Check if a live block is cached, without promoting it or counting a hit or miss.
    pub fn contains(&self, namespace: u64, key: u64) -> bool {
        let key = BlockKey::new(namespace, key);
        self.raw.contains(self.hash(&key), key)
    }

    /// Insert or replace a block. An empty value deletes the key.
    ///
    /// Returns `false` if the cache is closed or the value is larger than the capacity.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "blockcache::memory::cache::set"))]
    pub fn set(&self, namespace: u64, key: u64, value: impl Into<Bytes>) -> bool {
        self.try_set(namespace, key, value).is_ok()
    }

    /// Like [`Cache::set`], but tells why the set was rejected.
    pub fn try_set(&self, namespace: u64, key: u64, value: impl Into<Bytes>) -> std::result::Result<(), SetError> {
        let key = BlockKey::new(namespace, key);
        self.raw.try_set(self.hash(&key), key, value.into())
    }

    /// Delete a block. Outstanding handles keep reading it until they are released.
    ///
    /// Returns `false` if the block is not cached or the cache is closed.
    #[cfg_attr(feature = "tracing", fastrace::trace(name = "blockcache::memory::cache::delete"))]
    pub fn delete(&self, namespace: u64, key: u64) -> bool {
        let key = BlockKey::new(namespace, key);
        self.raw.delete(self.hash(&key), key)
    }

    /// Close the cache and evict everything. Calling it again is a noop.
    ///
    /// Blocks held by outstanding handles stay in the index until the handles are released. With `force`, they are
    /// taken out right away and later releases have no effect on the index.
    pub fn close(&self, force: bool) {
        self.raw.close(force)
    }

    /// Update the capacity in bytes, evicting as needed. Negative values count as zero. Noop once closed.
    pub fn set_capacity(&self, capacity: i64) {
        self.raw.set_capacity(capacity)
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> Stats {
        self.raw.stats()
    }

    /// Bytes billed against the capacity.
    pub fn usage(&self) -> i64 {
        self.raw.usage()
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> i64 {
        self.raw.capacity()
    }

    /// Bucket count of the current index generation.
    pub fn buckets(&self) -> usize {
        self.raw.buckets()
    }

    /// Check if the cache has been closed.
    pub fn is_closed(&self) -> bool {
        self.raw.is_closed()
    }

    /// Name of the cache.
    pub fn name(&self) -> &str {
        self.raw.name()
    }

    /// Hash builder of the cache.
    pub fn hash_builder(&self) -> &Arc<S> {
        &self.hash_builder
    }

    /// Metrics of the cache.
    pub fn metrics(&self) -> &Arc<Metrics> {
        self.raw.metrics()
    }
}

#[cfg(test)]
mod tests {
    use blockcache_common::{error::ErrorKind, hasher::ModHasher};

    use super::*;

    fn is_send_sync_static<T: Send + Sync + 'static>() {}

    #[test]
    fn test_send_sync_static() {
        is_send_sync_static::<Cache>();
        is_send_sync_static::<Cache<ModHasher>>();
    }

    #[test]
    fn test_build_errors() {
        let e = CacheBuilder::new(0).build().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);
        let e = CacheBuilder::new(-1).build().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);
        let e = CacheBuilder::new(1024).with_shards(0).build().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);
        let e = CacheBuilder::new(1024).with_eviction_strategy("arc").build().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);

        let cache = CacheBuilder::new(1024).with_eviction_strategy("lru").build().unwrap();
        assert_eq!(cache.capacity(), 1024);
    }

    #[test]
    fn test_shards_round_up() {
        let cache = CacheBuilder::new(1024).with_shards(5).build().unwrap();
        assert_eq!(cache.buckets(), 8);
        assert_eq!(cache.stats().buckets, 8);
    }

    #[test]
    fn test_config() {
        let config: CacheConfig = serde_json::from_str(
            r#"{"name":"sst","capacity":4096,"shards":4,"eviction":{"strategy":"lru"},"migration":"lazy"}"#,
        )
        .unwrap();
        assert_eq!(config.migration, MigrationMode::Lazy);

        let cache = CacheBuilder::from_config(config).build().unwrap();
        assert_eq!(cache.name(), "sst");
        assert_eq!(cache.capacity(), 4096);
        assert_eq!(cache.buckets(), 4);

        let config: CacheConfig = serde_json::from_str(r#"{"capacity":1}"#).unwrap();
        assert_eq!(config.shards, DEFAULT_SHARDS);

        assert!(serde_json::from_str::<CacheConfig>(r#"{"eviction":{"strategy":"fifo"}}"#).is_err());
    }

    #[test]
    fn test_cache_basic() {
        let cache = CacheBuilder::new(100)
            .with_hash_builder(ModHasher::default())
            .with_migration_mode(MigrationMode::Lazy)
            .build()
            .unwrap();

        assert!(cache.get(1, 1).is_none());
        assert!(cache.set(1, 1, "hello"));
        assert!(cache.set(2, 1, b"world".to_vec()));
        assert!(!cache.set(3, 1, vec![0u8; 101]));
        assert_eq!(
            cache.try_set(3, 1, vec![0u8; 101]),
            Err(SetError::TooLarge { size: 101, capacity: 100 })
        );

        let handle = cache.get(1, 1).unwrap();
        assert_eq!(handle.load().unwrap(), "hello");
        assert_eq!(handle.key(), Some(BlockKey::new(1, 1)));
        assert_eq!(cache.get(2, 1).unwrap().load().unwrap(), "world");
        assert!(cache.contains(2, 1));
        assert!(!cache.contains(3, 1));

        assert!(cache.delete(2, 1));
        assert!(!cache.contains(2, 1));
        assert!(cache.set(2, 1, ""));

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        // The empty value above deletes instead of counting as a set.
        assert_eq!(stats.sets, 2);
        assert_eq!(stats.deletes, 1);
        assert_eq!(stats.nodes, 1);
        assert_eq!(stats.usage, 5);

        cache.close(false);
        assert!(cache.is_closed());
        assert!(!cache.set(1, 2, "closed"));
        assert_eq!(cache.try_set(1, 2, "closed"), Err(SetError::Closed));
        assert_eq!(handle.load().unwrap(), "hello");
        drop(handle);
        assert_eq!(cache.stats().nodes, 0);
    }
}
