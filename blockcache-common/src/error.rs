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

use std::fmt::Display;

/// Kinds of failures reported by blockcache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Misconfiguration detected while building a cache.
    Config,
    /// The cache has been closed.
    Closed,
    /// A single entry does not fit into the cache.
    NoSpace,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Config => "Config error",
            ErrorKind::Closed => "Closed",
            ErrorKind::NoSpace => "No space",
        };
        f.write_str(s)
    }
}

/// Error returned by fallible blockcache functions.
///
/// `Display` renders a single line:
///
/// ```shell
/// Config error, context: { strategy: fifo } => unknown eviction strategy
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, String)>,
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        if !self.context.is_empty() {
            let context = self.context.iter().map(|(k, v)| format!("{k}: {v}")).collect::<Vec<_>>();
            write!(f, ", context: {{ {} }}", context.join(", "))?;
        }
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Create an error of `kind`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: vec![],
        }
    }

    /// Attach a key-value pair to the error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Kind of the error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message of the error.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Key-value pairs attached to the error.
    pub fn context(&self) -> &[(&'static str, String)] {
        &self.context
    }

    /// A [`ErrorKind::Config`] error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Config, message)
    }

    /// A [`ErrorKind::Closed`] error.
    pub fn closed() -> Self {
        Error::new(ErrorKind::Closed, "cache is closed")
    }

    /// A [`ErrorKind::NoSpace`] error for an entry of `required` bytes.
    pub fn no_space(capacity: i64, required: i64) -> Self {
        Error::new(ErrorKind::NoSpace, "entry is larger than the cache capacity")
            .with_context("capacity", capacity)
            .with_context("required", required)
    }
}

/// Result type for blockcache.
pub type Result<T> = std::result::Result<T, Error>;
