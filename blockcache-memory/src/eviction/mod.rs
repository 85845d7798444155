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

use std::{str::FromStr, sync::Arc};

use blockcache_common::error::{Error, Result};
use serde::{Deserialize, Serialize};

use self::lru::{Lru, LruConfig};
use crate::record::Record;

pub mod list;
pub mod lru;

/// Eviction algorithm config.
///
/// The strategy is selected by the `strategy` tag when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum EvictionConfig {
    /// Least recently used eviction.
    Lru(LruConfig),
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self::Lru(LruConfig::default())
    }
}

impl From<LruConfig> for EvictionConfig {
    fn from(value: LruConfig) -> Self {
        Self::Lru(value)
    }
}

impl FromStr for EvictionConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::Lru(LruConfig::default())),
            _ => Err(Error::config("unknown eviction strategy").with_context("strategy", s)),
        }
    }
}

/// Runtime eviction policy, one variant per strategy.
#[derive(Debug)]
pub enum Eviction {
    /// Least recently used eviction.
    Lru(Lru),
}

impl Eviction {
    /// Create the policy described by `config`.
    pub fn new(capacity: i64, config: &EvictionConfig) -> Self {
        match config {
            EvictionConfig::Lru(config) => Self::Lru(Lru::new(capacity, config)),
        }
    }

    /// Mark the record as the most recently used one and evict if needed.
    pub fn promote(&mut self, record: &Arc<Record>, victims: &mut Vec<Arc<Record>>) {
        match self {
            Self::Lru(lru) => lru.promote(record, victims),
        }
    }

    /// Exclude the record from tracking. Returns `true` if it was tracked.
    pub fn ban(&mut self, record: &Arc<Record>) -> bool {
        match self {
            Self::Lru(lru) => lru.ban(record),
        }
    }

    /// Update the capacity and evict if needed.
    pub fn set_capacity(&mut self, capacity: i64, victims: &mut Vec<Arc<Record>>) {
        match self {
            Self::Lru(lru) => lru.set_capacity(capacity, victims),
        }
    }

    /// Stop tracking every record.
    pub fn clear(&mut self, victims: &mut Vec<Arc<Record>>) {
        match self {
            Self::Lru(lru) => lru.clear(victims),
        }
    }

    /// Bytes billed by tracked records.
    pub fn usage(&self) -> i64 {
        match self {
            Self::Lru(lru) => lru.usage(),
        }
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> i64 {
        match self {
            Self::Lru(lru) => lru.capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use blockcache_common::error::ErrorKind;

    use super::*;

    #[test]
    fn test_eviction_config_from_str() {
        assert_eq!("lru".parse::<EvictionConfig>().unwrap(), EvictionConfig::default());
        assert_eq!(" LRU ".parse::<EvictionConfig>().unwrap(), EvictionConfig::default());
        let e = "arc".parse::<EvictionConfig>().unwrap_err();
        assert_eq!(e.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_eviction_config_serde() {
        let config: EvictionConfig = serde_json::from_str(r#"{"strategy":"lru"}"#).unwrap();
        assert_eq!(config, EvictionConfig::Lru(LruConfig::default()));
        assert_eq!(serde_json::to_string(&config).unwrap(), r#"{"strategy":"lru"}"#);
        assert!(serde_json::from_str::<EvictionConfig>(r#"{"strategy":"clock"}"#).is_err());
    }
}
