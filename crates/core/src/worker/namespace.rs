//! Version-derived namespace names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque release identifier chosen at build time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(transparent)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical role of a versioned namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheRole {
    /// Navigable documents, refreshed network-first.
    Pages,
    /// Everything else, served cache-first.
    Static,
}

impl CacheRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheRole::Pages => "pages",
            CacheRole::Static => "static",
        }
    }
}

/// `{prefix}-{role}-{version}`, or `{role}-{version}` with an empty prefix.
pub fn namespace_name(prefix: &str, role: CacheRole, version: &VersionTag) -> String {
    if prefix.is_empty() {
        format!("{}-{}", role.as_str(), version)
    } else {
        format!("{}-{}-{}", prefix, role.as_str(), version)
    }
}

/// The two live namespaces of one version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheNames {
    pub pages: String,
    #[serde(rename = "static")]
    pub static_assets: String,
}

impl CacheNames {
    pub fn for_version(prefix: &str, version: &VersionTag) -> Self {
        Self {
            pages: namespace_name(prefix, CacheRole::Pages, version),
            static_assets: namespace_name(prefix, CacheRole::Static, version),
        }
    }

    pub fn get(&self, role: CacheRole) -> &str {
        match role {
            CacheRole::Pages => &self.pages,
            CacheRole::Static => &self.static_assets,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pages == name || self.static_assets == name
    }
}
