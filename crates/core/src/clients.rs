//! Open pages controlled by the registration and the messages exchanged
//! with them.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};

use crate::Error;

/// Sentinel string a page posts to promote a waiting worker.
pub const SKIP_WAITING: &str = "SKIP_WAITING";

const CHANNEL_CAPACITY: usize = 32;

pub type ClientId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClientKind {
    Window,
    Worker,
}

/// Outbound message from the worker to pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    Updated { version: String },
}

/// Inbound control message from a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    SkipWaiting,
}

impl ClientMessage {
    /// Accepts the bare sentinel string or `{"type": "SKIP_WAITING"}`.
    pub fn parse(value: &serde_json::Value) -> Result<Self, Error> {
        let tag = match value {
            serde_json::Value::String(s) => Some(s.as_str()),
            serde_json::Value::Object(map) => map.get("type").and_then(|t| t.as_str()),
            _ => None,
        };

        match tag {
            Some(SKIP_WAITING) => Ok(ClientMessage::SkipWaiting),
            _ => Err(Error::InvalidInput(format!("unrecognized message: {value}"))),
        }
    }
}

/// Snapshot of one open page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ClientInfo {
    pub id: ClientId,
    pub kind: ClientKind,
    pub url: String,
    /// Version of the worker controlling this page, if any.
    pub controller: Option<String>,
}

#[derive(Debug)]
struct ClientSlot {
    info: ClientInfo,
    outbox: Vec<WorkerMessage>,
}

/// Registry of open pages.
///
/// Window clients receive broadcasts in a per-client outbox; any number of
/// listeners may also subscribe to the broadcast channel.
#[derive(Debug)]
pub struct Clients {
    slots: RwLock<BTreeMap<ClientId, ClientSlot>>,
    next_id: AtomicU64,
    tx: broadcast::Sender<WorkerMessage>,
}

impl Default for Clients {
    fn default() -> Self {
        Self::new()
    }
}

impl Clients {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { slots: RwLock::new(BTreeMap::new()), next_id: AtomicU64::new(1), tx }
    }

    pub async fn open(&self, kind: ClientKind, url: &str, controller: Option<String>) -> ClientId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let info = ClientInfo { id, kind, url: url.to_string(), controller };
        self.slots.write().await.insert(id, ClientSlot { info, outbox: Vec::new() });
        id
    }

    pub async fn close(&self, id: ClientId) -> bool {
        self.slots.write().await.remove(&id).is_some()
    }

    pub async fn get(&self, id: ClientId) -> Option<ClientInfo> {
        self.slots.read().await.get(&id).map(|slot| slot.info.clone())
    }

    pub async fn list(&self) -> Vec<ClientInfo> {
        self.slots.read().await.values().map(|slot| slot.info.clone()).collect()
    }

    /// Make `version` the controller of every open client.
    ///
    /// Returns the number of clients whose controller changed.
    pub async fn claim(&self, version: &str) -> usize {
        let mut slots = self.slots.write().await;
        let mut changed = 0;
        for slot in slots.values_mut() {
            if slot.info.controller.as_deref() != Some(version) {
                slot.info.controller = Some(version.to_string());
                changed += 1;
            }
        }
        changed
    }

    /// Post to every window client. Returns how many received it.
    pub async fn broadcast(&self, message: WorkerMessage) -> usize {
        let mut slots = self.slots.write().await;
        let mut delivered = 0;
        for slot in slots.values_mut().filter(|s| s.info.kind == ClientKind::Window) {
            slot.outbox.push(message.clone());
            delivered += 1;
        }
        // No subscribers is fine.
        let _ = self.tx.send(message);
        delivered
    }

    /// Take and clear the pending messages of a client.
    pub async fn drain(&self, id: ClientId) -> Result<Vec<WorkerMessage>, Error> {
        let mut slots = self.slots.write().await;
        let slot = slots
            .get_mut(&id)
            .ok_or_else(|| Error::InvalidInput(format!("unknown client: {id}")))?;
        Ok(std::mem::take(&mut slot.outbox))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkerMessage> {
        self.tx.subscribe()
    }
}
