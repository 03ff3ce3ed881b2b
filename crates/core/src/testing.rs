//! Test doubles for the store and network seams.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::Error;
use crate::cache::{CacheMatch, CacheStore, MemoryStore};
use crate::http::{CacheEntry, Request, RequestKey, ResponseSnapshot};
use crate::net::Network;

/// Network fake answering from a fixed URL → response table.
///
/// Unknown URLs and every URL while offline fail with `Error::Network`.
#[derive(Debug, Default)]
pub struct StaticNetwork {
    routes: Mutex<HashMap<String, ResponseSnapshot>>,
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl StaticNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, url: &str, response: ResponseSnapshot) -> Self {
        self.set(url, response);
        self
    }

    pub fn set(&self, url: &str, response: ResponseSnapshot) {
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Delay every fetch by `latency` before answering.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    /// Number of fetches issued for `url`, offline attempts included.
    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Network for StaticNetwork {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, Error> {
        let url = request.url.as_str().to_string();
        self.calls.lock().unwrap().push(url.clone());

        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {url}")));
        }

        self.routes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .ok_or_else(|| Error::Network(format!("no route: {url}")))
    }
}

/// Memory store that fails on demand.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_delete: Mutex<HashSet<String>>,
    /// Entry writes left before puts start failing; `None` never fails.
    put_budget: Mutex<Option<usize>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_delete_of(&self, name: &str) {
        self.fail_delete.lock().unwrap().insert(name.to_string());
    }

    pub fn fail_puts(&self, fail: bool) {
        *self.put_budget.lock().unwrap() = fail.then_some(0);
    }

    /// Let `n` entry writes through, then fail. A batch that does not fit in
    /// the remaining budget is rejected whole, like a rolled-back transaction.
    pub fn fail_puts_after(&self, n: usize) {
        *self.put_budget.lock().unwrap() = Some(n);
    }
}

#[async_trait]
impl CacheStore for FlakyStore {
    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.inner.keys().await
    }

    async fn create(&self, name: &str) -> Result<(), Error> {
        self.inner.create(name).await
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        if self.fail_delete.lock().unwrap().contains(name) {
            return Err(Error::EvictionFailed(format!("{name}: storage busy")));
        }
        self.inner.delete(name).await
    }

    async fn put(&self, name: &str, entry: CacheEntry) -> Result<(), Error> {
        self.put_all(name, vec![entry]).await
    }

    async fn put_all(&self, name: &str, entries: Vec<CacheEntry>) -> Result<(), Error> {
        {
            let mut budget = self.put_budget.lock().unwrap();
            if let Some(left) = budget.as_mut() {
                if entries.len() > *left {
                    return Err(Error::CorruptEntry(format!("{name}: quota exceeded")));
                }
                *left -= entries.len();
            }
        }
        self.inner.put_all(name, entries).await
    }

    async fn get(&self, name: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        self.inner.get(name, key).await
    }

    async fn match_any(&self, key: &RequestKey) -> Result<Option<CacheMatch>, Error> {
        self.inner.match_any(key).await
    }

    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        self.inner.entries(name).await
    }
}
