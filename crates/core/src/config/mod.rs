//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (LANTERN_*)
//! 2. TOML config file (if LANTERN_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// When an installed worker replaces the active one.
///
/// These are mutually exclusive; pick one per deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Promote right after a successful install.
    #[default]
    SkipWaiting,
    /// Stay waiting until a page sends the skip-waiting message.
    WaitForUser,
}

/// Fetch policy for non-navigable assets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StaticStrategy {
    /// Serve the cached copy and never revalidate it.
    #[default]
    CacheFirst,
    /// Serve the cached copy and refresh it in the background for next time.
    StaleWhileRevalidate,
}

/// URLs fetched at install time, relative to `scope` or absolute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecacheConfig {
    /// Must all cache successfully or the install fails.
    #[serde(default = "default_core")]
    pub core: Vec<String>,

    /// Best effort; failures are logged.
    #[serde(default = "default_large")]
    pub large: Vec<String>,
}

impl Default for PrecacheConfig {
    fn default() -> Self {
        Self { core: default_core(), large: default_large() }
    }
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (LANTERN_*)
/// 2. TOML config file (if LANTERN_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Build version. Bumping it invalidates every versioned namespace.
    ///
    /// Set via LANTERN_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Origin and base path the worker controls.
    ///
    /// Set via LANTERN_SCOPE environment variable.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// Prefix for namespace names (`{prefix}-pages-{version}`).
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Path to SQLite cache database. Unset (the default) keeps the cache
    /// in memory for the life of the process.
    ///
    /// Set via LANTERN_DB_PATH environment variable.
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// User-Agent string for HTTP requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes accepted per response (bulk data files included).
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    #[serde(default)]
    pub precache: PrecacheConfig,

    /// Document served when a navigable request misses network and cache.
    #[serde(default = "default_fallback_path")]
    pub fallback_path: String,

    /// Extra namespaces that survive every garbage-collection pass.
    #[serde(default)]
    pub persistent_caches: Vec<String>,

    #[serde(default)]
    pub update_policy: UpdatePolicy,

    #[serde(default)]
    pub static_strategy: StaticStrategy,

    /// Send `{type: "updated", version}` to window clients after activation.
    #[serde(default = "default_true")]
    pub broadcast_updates: bool,

    /// HTML returned when even the fallback document is missing.
    #[serde(default)]
    pub offline_notice: Option<String>,
}

fn default_version() -> String {
    "1.0.0".into()
}

fn default_scope() -> String {
    "http://localhost:8080/".into()
}

fn default_cache_prefix() -> String {
    "lantern".into()
}

fn default_user_agent() -> String {
    "lantern/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    52_428_800 // 50MB
}

fn default_fallback_path() -> String {
    "./index.html".into()
}

fn default_core() -> Vec<String> {
    [
        "./index.html",
        "./app/home.html",
        "./app/learn.html",
        "./app/settings.html",
        "./app/manifest.json",
        "./app/translations.js",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_large() -> Vec<String> {
    vec!["./Lernprogramm_Bibel.csv".into()]
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            scope: default_scope(),
            cache_prefix: default_cache_prefix(),
            db_path: None,
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            precache: PrecacheConfig::default(),
            fallback_path: default_fallback_path(),
            persistent_caches: Vec::new(),
            update_policy: UpdatePolicy::default(),
            static_strategy: StaticStrategy::default(),
            broadcast_updates: true,
            offline_notice: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the user-initiated full-download namespace.
    pub fn offline_namespace(&self) -> String {
        if self.cache_prefix.is_empty() { "offline".into() } else { format!("{}-offline", self.cache_prefix) }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `LANTERN_`
    /// 2. TOML file from `LANTERN_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment()
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("LANTERN_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(
            Env::prefixed("LANTERN_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        )
    }
}
