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

use std::sync::Arc;

use super::generation::Generation;

/// Spawn a thread that populates every bucket of `generation` once.
///
/// Lazy migration stays correct without it, so a spawn failure only costs latency on first access.
pub fn spawn(name: &str, generation: Arc<Generation>) {
    let len = generation.len();
    let res = std::thread::Builder::new()
        .name(format!("{name}-migrator"))
        .spawn(move || {
            generation.migrate_all();
            tracing::debug!(
                "[migrator]: background migration of generation with {} buckets exits",
                generation.len()
            );
        });
    match res {
        Ok(_) => tracing::debug!("[migrator]: background migration of generation with {len} buckets spawned"),
        Err(e) => tracing::warn!("[migrator]: failed to spawn background migration, fall back to lazy migration: {e}"),
    }
}
