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

#![cfg_attr(docsrs, feature(doc_cfg))]

//! Shared components for blockcache.

/// Allow enable debug assertions in release profile with feature "strict_assertion".
pub mod assert;
/// Traits for hashing the cache keys.
pub mod code;
/// The error type and result alias shared by all blockcache crates.
pub mod error;
/// Hashers for the cache index.
pub mod hasher;
/// The shared metrics model and registries.
pub mod metrics;
/// Scoped functional programming extensions.
pub mod scope;
