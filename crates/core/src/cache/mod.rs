//! Named cache namespaces of request → response entries.
//!
//! This module provides the [`CacheStore`] abstraction the worker is written
//! against, plus two implementations:
//!
//! - [`CacheDb`]: persistent SQLite storage via tokio-rusqlite (WAL mode,
//!   versioned migrations)
//! - [`MemoryStore`]: an in-process store for tests and ephemeral hosts
//!
//! Writes are atomic per entry (or per batch with `put_all`) and
//! last-writer-wins; no caller ever sees a partially applied write.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use crate::Error;
use crate::http::{CacheEntry, RequestKey, ResponseSnapshot};

pub use connection::CacheDb;
pub use memory::MemoryStore;

/// Persistent storage of cache namespaces.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Namespace names, oldest first.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Create the namespace if it does not exist yet.
    async fn create(&self, name: &str) -> Result<(), Error>;

    /// Delete a namespace and every entry in it.
    ///
    /// Returns whether the namespace existed.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Store an entry, replacing any previous entry with the same key.
    ///
    /// Creates the namespace lazily.
    async fn put(&self, name: &str, entry: CacheEntry) -> Result<(), Error>;

    /// Store a batch of entries as one unit: either every entry is written
    /// or the namespace is left exactly as it was.
    async fn put_all(&self, name: &str, entries: Vec<CacheEntry>) -> Result<(), Error>;

    /// Exact match within one namespace.
    async fn get(&self, name: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error>;

    /// Exact match across every namespace, oldest namespace first.
    async fn match_any(&self, key: &RequestKey) -> Result<Option<CacheMatch>, Error>;

    /// Request keys stored in a namespace, in insertion order.
    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, Error>;

    /// Delete every namespace whose name is not in `keep`.
    ///
    /// A failure on one namespace is recorded and the pass continues.
    async fn delete_all_except(&self, keep: &HashSet<String>) -> Result<EvictionReport, Error> {
        let mut report = EvictionReport::default();

        for name in self.keys().await? {
            if keep.contains(&name) {
                report.kept.push(name);
                continue;
            }

            match self.delete(&name).await {
                Ok(_) => report.deleted.push(name),
                Err(e) => report.failed.push(EvictionFailure { namespace: name, reason: e.to_string() }),
            }
        }

        Ok(report)
    }
}

impl<'s> dyn CacheStore + 's {
    /// Open (creating if needed) a namespace handle.
    pub async fn open(&self, name: &str) -> Result<Namespace<'_>, Error> {
        self.create(name).await?;
        Ok(Namespace { store: self, name: name.to_string() })
    }
}

/// Handle to one opened namespace.
pub struct Namespace<'a> {
    store: &'a dyn CacheStore,
    name: String,
}

impl Namespace<'_> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn put(&self, entry: CacheEntry) -> Result<(), Error> {
        self.store.put(&self.name, entry).await
    }

    pub async fn put_all(&self, entries: Vec<CacheEntry>) -> Result<(), Error> {
        self.store.put_all(&self.name, entries).await
    }

    pub async fn get(&self, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        self.store.get(&self.name, key).await
    }

    pub async fn keys(&self) -> Result<Vec<RequestKey>, Error> {
        self.store.entries(&self.name).await
    }
}

/// A cross-namespace hit and the namespace that holds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheMatch {
    pub namespace: String,
    pub response: ResponseSnapshot,
}

/// Outcome of a garbage-collection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EvictionReport {
    pub deleted: Vec<String>,
    pub kept: Vec<String>,
    pub failed: Vec<EvictionFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EvictionFailure {
    pub namespace: String,
    pub reason: String,
}
