//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting and filling cache namespaces.

pub mod download;
pub mod keys;

pub use download::{CacheDownloadParams, download_impl, refresh_impl};
pub use keys::{CacheKeysParams, keys_impl};
