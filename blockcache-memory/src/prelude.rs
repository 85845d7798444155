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

#[cfg(feature = "prometheus")]
pub use blockcache_common::metrics::registry::prometheus::PrometheusMetricsRegistry;
pub use blockcache_common::{
    code::{DefaultHashBuilder, HashBuilder},
    error::{Error, ErrorKind, Result},
    metrics::{model::Metrics, registry::noop::NoopMetricsRegistry, RegistryOps},
};

pub use crate::{
    cache::{Cache, CacheBuilder, CacheConfig, DEFAULT_SHARDS},
    error::SetError,
    eviction::{lru::LruConfig, EvictionConfig},
    handle::Handle,
    indexer::MigrationMode,
    key::BlockKey,
    stats::Stats,
};
