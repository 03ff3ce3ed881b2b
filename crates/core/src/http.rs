//! Request and response value types.
//!
//! These are deliberately small: the router only needs the method, the URL,
//! the `Accept` header and a byte-accurate copy of the response.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::hash::compute_entry_key;

/// The only method the cache manager intercepts.
pub const METHOD_GET: &str = "GET";

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Upper-cased HTTP method.
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: &str, url: Url) -> Self {
        Self { method: method.to_ascii_uppercase(), url, headers: Vec::new() }
    }

    pub fn get(url: Url) -> Self {
        Self::new(METHOD_GET, url)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Case-insensitive header lookup; first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_get(&self) -> bool {
        self.method == METHOD_GET
    }

    /// True when the `Accept` header asks for HTML.
    pub fn accepts_html(&self) -> bool {
        self.header("accept").is_some_and(|v| v.contains("text/html"))
    }

    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}

/// Cache key for an entry: method plus absolute URL without fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url: url.into() }
    }

    pub fn get(url: &Url) -> Self {
        Self::new(METHOD_GET, url)
    }

    /// Storage primary key derived from the canonical form.
    pub fn hash(&self) -> String {
        compute_entry_key(&self.method, &self.url)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Response type as seen by the page.
///
/// Opaque responses come from cross-origin no-cors fetches; their status is
/// unreadable and they are never written to the static namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    #[default]
    Basic,
    Opaque,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseKind::Basic => "basic",
            ResponseKind::Opaque => "opaque",
        }
    }
}

impl FromStr for ResponseKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "basic" => Ok(ResponseKind::Basic),
            "opaque" => Ok(ResponseKind::Opaque),
            other => Err(Error::CorruptEntry(format!("unknown response kind: {other}"))),
        }
    }
}

/// Immutable copy of a response at the time it was fetched or stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl ResponseSnapshot {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self { status, headers: Vec::new(), body: body.into(), kind: ResponseKind::Basic }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn opaque(mut self) -> Self {
        self.kind = ResponseKind::Opaque;
        self
    }

    /// Synthetic 503 with an empty body, served when a static asset is
    /// neither cached nor reachable.
    pub fn service_unavailable() -> Self {
        Self::new(503, Bytes::new())
    }

    /// Minimal HTML document served as the last offline resort.
    pub fn offline_notice(html: &str) -> Self {
        Self::new(200, Bytes::copy_from_slice(html.as_bytes()))
            .with_header("Content-Type", "text/html; charset=utf-8")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// A 200 that the page could actually read.
    pub fn is_cacheable(&self) -> bool {
        self.is_ok() && self.kind != ResponseKind::Opaque
    }
}

/// A (request key, response snapshot) pair as persisted in a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: RequestKey,
    pub response: ResponseSnapshot,
    pub stored_at: String,
}

impl CacheEntry {
    pub fn new(key: RequestKey, response: ResponseSnapshot) -> Self {
        Self { key, response, stored_at: chrono::Utc::now().to_rfc3339() }
    }
}
