//! The offline cache manager.
//!
//! A [`Worker`] is one versioned instance: its namespaces, precache
//! manifest and fetch router. A [`Registration`] owns the installing,
//! waiting and active workers and is the only entry point a host talks to.

pub mod background;
pub mod gc;
pub mod lifecycle;
pub mod namespace;
pub mod precache;
pub mod registration;
pub mod router;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use crate::Error;
use crate::cache::CacheStore;
use crate::config::{AppConfig, StaticStrategy, UpdatePolicy};
use crate::http::RequestKey;
use crate::net::Network;
use crate::scope::Scope;

pub use background::BackgroundTask;
pub use lifecycle::{Effect, LifecycleContext, LifecycleEvent, Transition, WorkerState, transition};
pub use namespace::{CacheNames, CacheRole, VersionTag};
pub use precache::{InstallReport, PrecacheManifest};
pub use registration::{ActivationReport, DownloadReport, MessageOutcome, Registration, RegistrationStatus};
pub use router::{FetchOutcome, FetchRouter, RequestClass, ResponseSource, classify};

/// Everything one worker version needs, resolved against its scope.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub version: VersionTag,
    pub scope: Scope,
    pub names: CacheNames,
    pub manifest: PrecacheManifest,
    pub fallback: Url,
    pub offline_namespace: String,
    /// Namespaces that survive garbage collection besides the current two.
    pub allow_list: Vec<String>,
    pub update_policy: UpdatePolicy,
    pub static_strategy: StaticStrategy,
    pub broadcast_updates: bool,
    pub offline_notice: Option<String>,
}

impl WorkerConfig {
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let version = VersionTag::new(config.version.trim());
        let scope = Scope::parse(&config.scope)?;
        let manifest = PrecacheManifest::resolve(&scope, &config.precache.core, &config.precache.large)?;
        let fallback = scope.resolve(&config.fallback_path)?;
        let offline_namespace = config.offline_namespace();

        let mut allow_list = config.persistent_caches.clone();
        if !allow_list.contains(&offline_namespace) {
            allow_list.push(offline_namespace.clone());
        }

        Ok(Self {
            names: CacheNames::for_version(&config.cache_prefix, &version),
            version,
            scope,
            manifest,
            fallback,
            offline_namespace,
            allow_list,
            update_policy: config.update_policy,
            static_strategy: config.static_strategy,
            broadcast_updates: config.broadcast_updates,
            offline_notice: config.offline_notice.clone(),
        })
    }
}

/// Serializable view of a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct WorkerStatus {
    pub version: VersionTag,
    pub state: WorkerState,
    pub namespaces: CacheNames,
}

/// One versioned instance of the cache manager.
pub struct Worker {
    config: WorkerConfig,
    router: FetchRouter,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
}

impl Worker {
    pub fn new(config: WorkerConfig, store: Arc<dyn CacheStore>, network: Arc<dyn Network>) -> Self {
        let router = FetchRouter::new(
            store,
            network,
            config.scope.clone(),
            config.names.clone(),
            RequestKey::get(&config.fallback),
        )
        .with_strategy(config.static_strategy)
        .with_offline_notice(config.offline_notice.clone());

        Self { config, router, state: RwLock::new(WorkerState::Idle), skip_waiting: AtomicBool::new(false) }
    }

    pub fn version(&self) -> &VersionTag {
        &self.config.version
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn router(&self) -> &FetchRouter {
        &self.router
    }

    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    pub async fn status(&self) -> WorkerStatus {
        WorkerStatus { version: self.config.version.clone(), state: self.state().await, namespaces: self.config.names.clone() }
    }

    pub(crate) fn request_skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    /// Deliver a lifecycle event and record the new state.
    pub(crate) async fn deliver(&self, event: LifecycleEvent, has_active: bool) -> Result<Vec<Effect>, Error> {
        let mut state = self.state.write().await;
        let ctx = LifecycleContext {
            has_active,
            policy: self.config.update_policy,
            skip_waiting_requested: self.skip_waiting.load(Ordering::SeqCst),
            broadcast_updates: self.config.broadcast_updates,
        };

        let prev = *state;
        let t = transition(prev, event, &ctx)?;
        if t.next != prev {
            tracing::info!(version = %self.config.version, from = %prev, to = %t.next, %event, "worker state changed");
        }
        *state = t.next;
        Ok(t.effects)
    }
}
