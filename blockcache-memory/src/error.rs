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

/// Reason a set was rejected.
///
/// A rejected set leaves the previous value of the key, if any, untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SetError {
    /// The cache has been closed.
    #[error("cache closed")]
    Closed,
    /// The value alone is larger than the cache capacity.
    #[error("value too large: size {size} > capacity {capacity}")]
    TooLarge {
        /// Value size in bytes.
        size: i64,
        /// Cache capacity in bytes.
        capacity: i64,
    },
}

impl From<SetError> for blockcache_common::error::Error {
    fn from(e: SetError) -> Self {
        match e {
            SetError::Closed => Self::closed(),
            SetError::TooLarge { size, capacity } => Self::no_space(capacity, size),
        }
    }
}
