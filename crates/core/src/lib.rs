//! Core types and shared functionality for lantern.
//!
//! This crate provides:
//! - Versioned cache namespaces with SQLite and in-memory backends
//! - The worker lifecycle, precache loader, garbage collector and fetch router
//! - Client registry and update messages
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod clients;
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod scope;
pub mod worker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use cache::{CacheDb, CacheStore, MemoryStore};
pub use clients::{ClientId, ClientKind, Clients, WorkerMessage};
pub use config::AppConfig;
pub use error::Error;
pub use http::{CacheEntry, Request, RequestKey, ResponseKind, ResponseSnapshot};
pub use net::Network;
pub use scope::Scope;
pub use worker::{FetchOutcome, Registration, ResponseSource, WorkerConfig};
