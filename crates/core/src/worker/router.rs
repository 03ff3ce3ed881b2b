//! Per-request fetch policy.
//!
//! ### Classification
//! - Navigable: `Accept` contains `text/html`, or the path ends in `.html`
//!   or `/`.
//! - Static: everything else.
//!
//! ### Policies
//! - Navigable, network-first: a 200 is written to the pages namespace in the
//!   background. When the network fails: exact cache hit, then the fallback
//!   document, then the optional offline notice, then no response.
//! - Static, cache-first: a hit is returned without touching the network. A
//!   miss goes to the network; a readable 200 is written to the static
//!   namespace. A network failure yields a synthetic 503.
//! - Static, stale-while-revalidate: like cache-first, but every hit also
//!   refreshes the entry in the background for the next request. The fresh
//!   copy goes back into the namespace the hit came from, so a precached
//!   asset is refreshed in place.
//!
//! Non-GET and cross-origin requests are never intercepted.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheMatch, CacheStore};
use crate::config::StaticStrategy;
use crate::http::{CacheEntry, Request, RequestKey, ResponseSnapshot};
use crate::net::Network;
use crate::scope::Scope;
use crate::worker::background::BackgroundTask;
use crate::worker::namespace::CacheNames;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    Navigable,
    Static,
}

/// Classify a request by its `Accept` header and path.
pub fn classify(request: &Request) -> RequestClass {
    let path = request.url.path();
    if request.accepts_html() || path.ends_with(".html") || path.ends_with('/') {
        RequestClass::Navigable
    } else {
        RequestClass::Static
    }
}

/// Where a routed response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    Fallback,
    OfflineNotice,
    Synthetic,
}

/// Result of routing one request.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Not intercepted; the page talks to the network directly.
    Passthrough,
    Respond {
        response: ResponseSnapshot,
        source: ResponseSource,
        /// Cache write or revalidation still running, if any.
        background: Option<BackgroundTask>,
    },
    /// Intercepted, but nothing could be served.
    NoResponse,
}

impl FetchOutcome {
    fn respond(response: ResponseSnapshot, source: ResponseSource) -> Self {
        FetchOutcome::Respond { response, source, background: None }
    }

    pub fn response(&self) -> Option<&ResponseSnapshot> {
        match self {
            FetchOutcome::Respond { response, .. } => Some(response),
            _ => None,
        }
    }

    pub fn source(&self) -> Option<ResponseSource> {
        match self {
            FetchOutcome::Respond { source, .. } => Some(*source),
            _ => None,
        }
    }

    /// Wait for any background work attached to this outcome.
    pub async fn settle(self) -> Self {
        match self {
            FetchOutcome::Respond { response, source, background: Some(task) } => {
                task.wait().await;
                FetchOutcome::Respond { response, source, background: None }
            }
            other => other,
        }
    }
}

/// Applies the fetch policies for one worker version.
pub struct FetchRouter {
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    scope: Scope,
    names: CacheNames,
    fallback: RequestKey,
    strategy: StaticStrategy,
    offline_notice: Option<String>,
}

impl FetchRouter {
    pub fn new(
        store: Arc<dyn CacheStore>, network: Arc<dyn Network>, scope: Scope, names: CacheNames, fallback: RequestKey,
    ) -> Self {
        Self {
            store,
            network,
            scope,
            names,
            fallback,
            strategy: StaticStrategy::default(),
            offline_notice: None,
        }
    }

    pub fn with_strategy(mut self, strategy: StaticStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_offline_notice(mut self, html: Option<String>) -> Self {
        self.offline_notice = html;
        self
    }

    pub fn names(&self) -> &CacheNames {
        &self.names
    }

    /// Route one intercepted request.
    pub async fn route(&self, request: &Request) -> FetchOutcome {
        if !request.is_get() || !self.scope.is_same_origin(&request.url) {
            return FetchOutcome::Passthrough;
        }

        let class = classify(request);
        tracing::debug!(url = %request.url, policy = ?class, "routing request");

        match class {
            RequestClass::Navigable => self.network_first(request).await,
            RequestClass::Static => self.cache_first(request).await,
        }
    }

    async fn network_first(&self, request: &Request) -> FetchOutcome {
        match self.network.fetch(request).await {
            Ok(response) => {
                let background = response
                    .is_ok()
                    .then(|| self.spawn_put(self.names.pages.clone(), request.key(), response.clone()));
                FetchOutcome::Respond { response, source: ResponseSource::Network, background }
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network unavailable, falling back to cache");
                self.offline_navigation(request).await
            }
        }
    }

    async fn offline_navigation(&self, request: &Request) -> FetchOutcome {
        if let Some(hit) = self.lookup(&request.key()).await {
            return FetchOutcome::respond(hit.response, ResponseSource::Cache);
        }

        if let Some(fallback) = self.lookup(&self.fallback).await {
            return FetchOutcome::respond(fallback.response, ResponseSource::Fallback);
        }

        match &self.offline_notice {
            Some(html) => FetchOutcome::respond(ResponseSnapshot::offline_notice(html), ResponseSource::OfflineNotice),
            None => {
                tracing::warn!(url = %request.url, "offline with no cached page or fallback");
                FetchOutcome::NoResponse
            }
        }
    }

    async fn cache_first(&self, request: &Request) -> FetchOutcome {
        let key = request.key();

        if let Some(CacheMatch { namespace, response }) = self.lookup(&key).await {
            let background = match self.strategy {
                StaticStrategy::CacheFirst => None,
                StaticStrategy::StaleWhileRevalidate => Some(self.spawn_revalidate(request.clone(), namespace)),
            };
            return FetchOutcome::Respond { response, source: ResponseSource::Cache, background };
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                let background = response
                    .is_cacheable()
                    .then(|| self.spawn_put(self.names.static_assets.clone(), key, response.clone()));
                FetchOutcome::Respond { response, source: ResponseSource::Network, background }
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "static asset unavailable");
                FetchOutcome::respond(ResponseSnapshot::service_unavailable(), ResponseSource::Synthetic)
            }
        }
    }

    /// Exact match across namespaces; read failures count as a miss.
    async fn lookup(&self, key: &RequestKey) -> Option<CacheMatch> {
        match self.store.match_any(key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed");
                None
            }
        }
    }

    fn spawn_put(&self, namespace: String, key: RequestKey, response: ResponseSnapshot) -> BackgroundTask {
        let store = Arc::clone(&self.store);
        BackgroundTask::spawn(async move {
            if let Err(e) = store.put(&namespace, CacheEntry::new(key, response)).await {
                tracing::warn!(namespace = %namespace, error = %e, "cache write failed");
            }
        })
    }

    fn spawn_revalidate(&self, request: Request, namespace: String) -> BackgroundTask {
        let store = Arc::clone(&self.store);
        let network = Arc::clone(&self.network);
        BackgroundTask::spawn(async move {
            match network.fetch(&request).await {
                Ok(response) if response.is_cacheable() => {
                    if let Err(e) = store.put(&namespace, CacheEntry::new(request.key(), response)).await {
                        tracing::warn!(namespace = %namespace, error = %e, "revalidation write failed");
                    }
                }
                Ok(response) => {
                    tracing::debug!(url = %request.url, status = response.status, "revalidation kept cached copy");
                }
                Err(e) => tracing::debug!(url = %request.url, error = %e, "revalidation skipped"),
            }
        })
    }
}
