//! Host-facing entry points: install, activate, fetch and message.
//!
//! A [`Registration`] holds up to three workers at once (installing, waiting,
//! active), executes the effects the lifecycle state machine asks for, and
//! routes fetches through whichever worker is active.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::Error;
use crate::cache::{CacheStore, EvictionReport};
use crate::clients::{ClientId, ClientKind, ClientMessage, Clients, WorkerMessage};
use crate::http::Request;
use crate::net::Network;
use crate::worker::gc::collect_garbage;
use crate::worker::lifecycle::{Effect, LifecycleEvent, WorkerState};
use crate::worker::precache::{self, InstallReport, PrecacheFailure};
use crate::worker::router::FetchOutcome;
use crate::worker::{Worker, WorkerConfig, WorkerStatus};

#[derive(Default)]
struct Slots {
    installing: Option<Arc<Worker>>,
    waiting: Option<Arc<Worker>>,
    active: Option<Arc<Worker>>,
}

/// What an activation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ActivationReport {
    pub version: String,
    pub eviction: EvictionReport,
    /// Clients whose controller changed.
    pub claimed: usize,
    /// Window clients that received the update notice.
    pub notified: usize,
}

/// Result of posting a control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MessageOutcome {
    /// A waiting worker was promoted.
    Activated { report: ActivationReport },
    /// The message reached a worker mid-install, which activated itself as
    /// soon as its install succeeded.
    Deferred { version: String },
    /// Nothing was waiting.
    Ignored,
}

/// Result of a user-initiated offline download.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DownloadReport {
    pub namespace: String,
    pub cached: Vec<String>,
    pub failed: Vec<PrecacheFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RegistrationStatus {
    pub active: Option<WorkerStatus>,
    pub waiting: Option<WorkerStatus>,
    pub installing: Option<WorkerStatus>,
    pub clients: usize,
    pub namespaces: Vec<String>,
}

pub struct Registration {
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    clients: Arc<Clients>,
    slots: RwLock<Slots>,
    /// Serializes install and activation.
    lifecycle: Mutex<()>,
}

impl Registration {
    pub fn new(store: Arc<dyn CacheStore>, network: Arc<dyn Network>) -> Self {
        Self {
            store,
            network,
            clients: Arc::new(Clients::new()),
            slots: RwLock::new(Slots::default()),
            lifecycle: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn clients(&self) -> &Arc<Clients> {
        &self.clients
    }

    pub async fn active(&self) -> Option<Arc<Worker>> {
        self.slots.read().await.active.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<Worker>> {
        self.slots.read().await.waiting.clone()
    }

    /// Install a new worker version.
    ///
    /// On success the worker waits, or is activated right away when this is
    /// the first install, the update policy skips waiting, or a skip-waiting
    /// message arrived during the install.
    ///
    /// # Errors
    ///
    /// `Error::InstallFailed` when a core precache entry could not be
    /// cached. The worker becomes redundant and the current active worker
    /// stays in control.
    pub async fn install(&self, config: WorkerConfig) -> Result<InstallReport, Error> {
        let _guard = self.lifecycle.lock().await;

        let worker = Arc::new(Worker::new(config, Arc::clone(&self.store), Arc::clone(&self.network)));
        let has_active = self.slots.read().await.active.is_some();

        let effects = worker.deliver(LifecycleEvent::Install, has_active).await?;
        self.slots.write().await.installing = Some(Arc::clone(&worker));

        let mut result = Ok(InstallReport::default());
        for effect in effects {
            match effect {
                Effect::Precache => {
                    let config = worker.config();
                    result =
                        precache::precache(&*self.store, &*self.network, &config.names.pages, &config.manifest).await;
                }
                other => stray_effect(worker.version().as_str(), other),
            }
        }

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                worker.deliver(LifecycleEvent::InstallFailed, has_active).await?;
                self.slots.write().await.installing = None;
                tracing::warn!(version = %worker.version(), error = %e, "install failed, keeping current worker");
                return Err(e);
            }
        };

        let effects = worker.deliver(LifecycleEvent::InstallSucceeded, has_active).await?;
        let replaced = {
            let mut slots = self.slots.write().await;
            slots.installing = None;
            slots.waiting.replace(Arc::clone(&worker))
        };
        if let Some(old) = replaced {
            old.deliver(LifecycleEvent::Replaced, has_active).await?;
        }

        if effects.is_empty() {
            tracing::info!(version = %worker.version(), "new version waiting for skip-waiting message");
        }
        for effect in effects {
            match effect {
                Effect::Activate => {
                    self.activate_locked().await?;
                }
                other => stray_effect(worker.version().as_str(), other),
            }
        }

        Ok(report)
    }

    /// Promote the waiting worker.
    pub async fn activate(&self) -> Result<ActivationReport, Error> {
        let _guard = self.lifecycle.lock().await;
        self.activate_locked().await
    }

    async fn activate_locked(&self) -> Result<ActivationReport, Error> {
        let (worker, has_active) = {
            let slots = self.slots.read().await;
            (slots.waiting.clone().ok_or(Error::NoWaitingWorker)?, slots.active.is_some())
        };

        let effects = worker.deliver(LifecycleEvent::Activate, has_active).await?;

        let previous = {
            let mut slots = self.slots.write().await;
            slots.waiting = None;
            slots.active.replace(Arc::clone(&worker))
        };
        if let Some(old) = previous {
            old.deliver(LifecycleEvent::Replaced, true).await?;
        }

        let version = worker.version().to_string();
        let mut report =
            ActivationReport { version: version.clone(), eviction: EvictionReport::default(), claimed: 0, notified: 0 };

        for effect in effects {
            match effect {
                Effect::CollectGarbage => {
                    let config = worker.config();
                    match collect_garbage(&*self.store, &config.names, &config.allow_list).await {
                        Ok(eviction) => report.eviction = eviction,
                        Err(e) => tracing::warn!(%version, error = %e, "garbage collection skipped"),
                    }
                }
                Effect::ClaimClients => report.claimed = self.clients.claim(&version).await,
                Effect::BroadcastUpdated => {
                    report.notified = self.clients.broadcast(WorkerMessage::Updated { version: version.clone() }).await;
                }
                other => stray_effect(&version, other),
            }
        }

        worker.deliver(LifecycleEvent::ActivationFinished, true).await?;
        tracing::info!(%version, claimed = report.claimed, evicted = report.eviction.deleted.len(), "worker activated");

        Ok(report)
    }

    /// Route a request through the active worker.
    ///
    /// Requests from a known client that no worker controls pass through,
    /// as do all requests while no worker is active.
    pub async fn fetch(&self, client_id: Option<ClientId>, request: &Request) -> FetchOutcome {
        let Some(worker) = self.active().await else {
            return FetchOutcome::Passthrough;
        };

        if let Some(id) = client_id {
            match self.clients.get(id).await {
                Some(info) if info.controller.is_some() => {}
                _ => {
                    tracing::debug!(client = id, url = %request.url, "uncontrolled client, not intercepting");
                    return FetchOutcome::Passthrough;
                }
            }
        }

        if !worker.state().await.can_intercept_fetch() {
            return FetchOutcome::Passthrough;
        }

        worker.router().route(request).await
    }

    /// Handle a control message posted by a page.
    ///
    /// Waits for an install or activation in progress to finish, so the
    /// outcome always describes the slots as they are afterwards.
    pub async fn post_message(&self, message: &serde_json::Value) -> Result<MessageOutcome, Error> {
        match ClientMessage::parse(message)? {
            ClientMessage::SkipWaiting => self.skip_waiting().await,
        }
    }

    async fn skip_waiting(&self) -> Result<MessageOutcome, Error> {
        // The running install reads the flag when it succeeds.
        let installing = self.slots.read().await.installing.clone();
        if let Some(worker) = &installing {
            worker.request_skip_waiting();
        }

        let _guard = self.lifecycle.lock().await;
        let (waiting, has_active) = {
            let slots = self.slots.read().await;
            (slots.waiting.clone(), slots.active.is_some())
        };

        if let Some(worker) = waiting {
            let effects = worker.deliver(LifecycleEvent::SkipWaiting, has_active).await?;
            if effects.contains(&Effect::Activate) {
                let report = self.activate_locked().await?;
                return Ok(MessageOutcome::Activated { report });
            }
        }

        // A flagged install that failed is redundant by now and takes nothing.
        if let Some(worker) = installing
            && worker.state().await == WorkerState::Active
        {
            return Ok(MessageOutcome::Deferred { version: worker.version().to_string() });
        }

        tracing::debug!("skip-waiting message with nothing waiting");
        Ok(MessageOutcome::Ignored)
    }

    /// Register an open page. It is controlled by the active worker, if any.
    pub async fn open_client(&self, kind: ClientKind, url: &str) -> ClientId {
        let controller = self.active().await.map(|w| w.version().to_string());
        self.clients.open(kind, url, controller).await
    }

    /// Forget a closed page and any messages still queued for it.
    pub async fn close_client(&self, id: ClientId) -> Result<(), Error> {
        if self.clients.close(id).await {
            tracing::debug!(client = id, "client closed");
            Ok(())
        } else {
            Err(Error::InvalidInput(format!("unknown client: {id}")))
        }
    }

    /// Download `urls` into the persistent offline namespace.
    ///
    /// Entries are fetched independently; failures are reported per URL.
    pub async fn offline_download(&self, urls: &[String]) -> Result<DownloadReport, Error> {
        let worker = self.active().await.ok_or(Error::NoActiveWorker)?;
        let config = worker.config();

        let resolved = urls.iter().map(|u| config.scope.resolve(u)).collect::<Result<Vec<_>, _>>()?;
        let offline = self.store.open(&config.offline_namespace).await?;
        let offline = &offline;
        let network = &*self.network;

        let settled = join_all(
            resolved.iter().map(|url| async move { (url, precache::store_one(offline, network, url).await) }),
        )
        .await;

        let mut report = DownloadReport { namespace: config.offline_namespace.clone(), ..Default::default() };
        for (url, result) in settled {
            match result {
                Ok(()) => report.cached.push(url.to_string()),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "offline download entry skipped");
                    report.failed.push(PrecacheFailure { url: url.to_string(), reason: e.to_string() });
                }
            }
        }

        tracing::info!(
            namespace = %report.namespace,
            cached = report.cached.len(),
            failed = report.failed.len(),
            "offline download complete"
        );
        Ok(report)
    }

    /// Re-run the precache of the active worker into its pages namespace.
    pub async fn refresh_precache(&self) -> Result<InstallReport, Error> {
        let worker = self.active().await.ok_or(Error::NoActiveWorker)?;
        let config = worker.config();
        precache::precache(&*self.store, &*self.network, &config.names.pages, &config.manifest).await
    }

    pub async fn status(&self) -> Result<RegistrationStatus, Error> {
        let (active, waiting, installing) = {
            let slots = self.slots.read().await;
            (slots.active.clone(), slots.waiting.clone(), slots.installing.clone())
        };

        Ok(RegistrationStatus {
            active: worker_status(active).await,
            waiting: worker_status(waiting).await,
            installing: worker_status(installing).await,
            clients: self.clients.list().await.len(),
            namespaces: self.store.keys().await?,
        })
    }
}

fn stray_effect(version: &str, effect: Effect) {
    tracing::warn!(version, ?effect, "lifecycle effect not applicable in this phase");
}

async fn worker_status(worker: Option<Arc<Worker>>) -> Option<WorkerStatus> {
    let worker = worker?;
    Some(worker.status().await)
}
