//! Client code for lantern.
//!
//! This crate provides the HTTP transport the cache manager fetches through,
//! shared by the server and its tools.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig};
