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
    cmp::Ordering,
    fmt::Display,
    hash::{Hash, Hasher},
};

use serde::{Deserialize, Serialize};

/// Compound identity of a cached block.
///
/// `namespace` is usually a file identifier and `key` the block offset inside that file.
///
/// Keys order by `key` first and `namespace` second, which is the order records are kept in inside a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockKey {
    /// Namespace of the key, e.g. the file identifier.
    pub namespace: u64,
    /// Key inside the namespace, e.g. the block offset.
    pub key: u64,
}

impl BlockKey {
    /// Create a block key.
    pub fn new(namespace: u64, key: u64) -> Self {
        Self { namespace, key }
    }
}

impl Ord for BlockKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.namespace.cmp(&other.namespace))
    }
}

impl PartialOrd for BlockKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for BlockKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.namespace);
        state.write_u64(self.key);
    }
}

impl Display for BlockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.key)
    }
}

impl From<(u64, u64)> for BlockKey {
    fn from((namespace, key): (u64, u64)) -> Self {
        Self { namespace, key }
    }
}
