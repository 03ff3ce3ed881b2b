//! Install-time population of the pages namespace.
//!
//! Core entries behave like `Cache.addAll`: every one is fetched first and
//! nothing is written unless all of them came back 200. They are then
//! written as one batch. Large entries are
//! fetched and stored independently; their failures are only logged.

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;
use crate::cache::{CacheStore, Namespace};
use crate::http::{CacheEntry, Request, RequestKey, ResponseSnapshot};
use crate::net::Network;
use crate::scope::Scope;

/// URLs cached at install time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheManifest {
    pub core: Vec<Url>,
    pub large: Vec<Url>,
}

impl PrecacheManifest {
    /// Resolve relative entries against the worker scope.
    pub fn resolve(scope: &Scope, core: &[String], large: &[String]) -> Result<Self, Error> {
        Ok(Self {
            core: core.iter().map(|e| scope.resolve(e)).collect::<Result<_, _>>()?,
            large: large.iter().map(|e| scope.resolve(e)).collect::<Result<_, _>>()?,
        })
    }
}

/// What an install (or a precache refresh) stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct InstallReport {
    pub namespace: String,
    pub core_cached: Vec<String>,
    pub large_cached: Vec<String>,
    pub large_failed: Vec<PrecacheFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PrecacheFailure {
    pub url: String,
    pub reason: String,
}

async fn fetch_ok(network: &dyn Network, url: &Url) -> Result<ResponseSnapshot, Error> {
    let response = network.fetch(&Request::get(url.clone())).await?;
    if response.is_ok() {
        Ok(response)
    } else {
        Err(Error::HttpError(format!("status {}", response.status)))
    }
}

pub(crate) async fn store_one(pages: &Namespace<'_>, network: &dyn Network, url: &Url) -> Result<(), Error> {
    let response = fetch_ok(network, url).await?;
    pages.put(CacheEntry::new(RequestKey::get(url), response)).await
}

/// Populate `namespace` from `manifest`.
///
/// # Errors
///
/// Returns `Error::InstallFailed` listing every core URL that could not be
/// fetched with a 200 or could not be stored. When the namespace did not
/// exist beforehand it is removed again, so a failed install leaves nothing
/// behind.
pub async fn precache(
    store: &dyn CacheStore, network: &dyn Network, namespace: &str, manifest: &PrecacheManifest,
) -> Result<InstallReport, Error> {
    let existed = store.keys().await?.iter().any(|k| k == namespace);

    let fetched = join_all(manifest.core.iter().map(|url| async move { (url, fetch_ok(network, url).await) })).await;

    let mut failures = Vec::new();
    let mut responses = Vec::with_capacity(fetched.len());
    for (url, result) in fetched {
        match result {
            Ok(response) => responses.push((url, response)),
            Err(e) => failures.push(format!("{url} ({e})")),
        }
    }

    if !failures.is_empty() {
        tracing::warn!(namespace, failed = failures.len(), "core precache failed");
        return Err(Error::InstallFailed(failures));
    }

    let pages = store.open(namespace).await?;
    let mut report = InstallReport { namespace: namespace.to_string(), ..Default::default() };

    let core: Vec<CacheEntry> =
        responses.into_iter().map(|(url, response)| CacheEntry::new(RequestKey::get(url), response)).collect();
    let core_urls: Vec<String> = core.iter().map(|entry| entry.key.url.clone()).collect();

    // One batch, so a refresh of a live namespace never lands half-written.
    if let Err(e) = pages.put_all(core).await {
        tracing::warn!(namespace, error = %e, "core precache write failed");
        if !existed && let Err(e) = store.delete(namespace).await {
            tracing::warn!(namespace, error = %e, "failed to remove namespace after failed core write");
        }
        return Err(Error::InstallFailed(core_urls.iter().map(|url| format!("{url} ({e})")).collect()));
    }
    report.core_cached = core_urls;

    let pages = &pages;
    let settled =
        join_all(manifest.large.iter().map(|url| async move { (url, store_one(pages, network, url).await) })).await;

    for (url, result) in settled {
        match result {
            Ok(()) => report.large_cached.push(url.to_string()),
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "large precache entry skipped");
                report.large_failed.push(PrecacheFailure { url: url.to_string(), reason: e.to_string() });
            }
        }
    }

    tracing::info!(
        namespace,
        core = report.core_cached.len(),
        large = report.large_cached.len(),
        large_failed = report.large_failed.len(),
        "precache complete"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::testing::{FlakyStore, StaticNetwork};

    fn scope() -> Scope {
        Scope::parse("https://app.test/").unwrap()
    }

    fn manifest(core: &[&str], large: &[&str]) -> PrecacheManifest {
        let core: Vec<String> = core.iter().map(|s| s.to_string()).collect();
        let large: Vec<String> = large.iter().map(|s| s.to_string()).collect();
        PrecacheManifest::resolve(&scope(), &core, &large).unwrap()
    }

    fn key(url: &str) -> RequestKey {
        RequestKey::get(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_manifest_resolves_relative_entries() {
        let m = manifest(&["./index.html", "/app/home.html"], &["data.csv"]);
        assert_eq!(m.core[0].as_str(), "https://app.test/index.html");
        assert_eq!(m.core[1].as_str(), "https://app.test/app/home.html");
        assert_eq!(m.large[0].as_str(), "https://app.test/data.csv");
    }

    #[tokio::test]
    async fn test_large_failure_does_not_fail_install() {
        let store = MemoryStore::new();
        let network = StaticNetwork::new()
            .route("https://app.test/a.html", ResponseSnapshot::new(200, "a"))
            .route("https://app.test/b.html", ResponseSnapshot::new(200, "b"))
            .route("https://app.test/data.csv", ResponseSnapshot::new(404, "missing"));

        let report = precache(&store, &network, "pages-1", &manifest(&["/a.html", "/b.html"], &["/data.csv"]))
            .await
            .unwrap();

        assert_eq!(report.core_cached.len(), 2);
        assert!(report.large_cached.is_empty());
        assert_eq!(report.large_failed.len(), 1);
        assert_eq!(report.large_failed[0].url, "https://app.test/data.csv");

        assert!(store.get("pages-1", &key("https://app.test/a.html")).await.unwrap().is_some());
        assert!(store.get("pages-1", &key("https://app.test/b.html")).await.unwrap().is_some());
        assert!(store.get("pages-1", &key("https://app.test/data.csv")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_large_success_is_cached() {
        let store = MemoryStore::new();
        let network = StaticNetwork::new()
            .route("https://app.test/index.html", ResponseSnapshot::new(200, "home"))
            .route("https://app.test/data.csv", ResponseSnapshot::new(200, "a;b;c"));

        let report =
            precache(&store, &network, "pages-1", &manifest(&["./index.html"], &["./data.csv"])).await.unwrap();
        assert_eq!(report.large_cached, vec!["https://app.test/data.csv".to_string()]);
    }

    #[tokio::test]
    async fn test_core_non_200_fails_and_writes_nothing() {
        let store = MemoryStore::new();
        let network = StaticNetwork::new()
            .route("https://app.test/a.html", ResponseSnapshot::new(200, "a"))
            .route("https://app.test/b.html", ResponseSnapshot::new(500, "boom"));

        let err = precache(&store, &network, "pages-1", &manifest(&["/a.html", "/b.html"], &[]))
            .await
            .unwrap_err();

        assert!(matches!(&err, Error::InstallFailed(urls) if urls.len() == 1 && urls[0].contains("/b.html")));
        assert!(store.keys().await.unwrap().is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_core_network_error_fails_install() {
        let store = MemoryStore::new();
        let network = StaticNetwork::new().route("https://app.test/a.html", ResponseSnapshot::new(200, "a"));
        network.set_offline(true);

        let err = precache(&store, &network, "pages-1", &manifest(&["/a.html"], &[])).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_core_store_failure_removes_new_namespace() {
        let store = FlakyStore::new();
        store.fail_puts(true);
        let network = StaticNetwork::new().route("https://app.test/a.html", ResponseSnapshot::new(200, "a"));

        let err = precache(&store, &network, "pages-1", &manifest(&["/a.html"], &[])).await.unwrap_err();
        assert!(matches!(err, Error::InstallFailed(_)));
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_leaves_existing_namespace_untouched() {
        let store = FlakyStore::new();
        let network = StaticNetwork::new()
            .route("https://app.test/a.html", ResponseSnapshot::new(200, "a v1"))
            .route("https://app.test/b.html", ResponseSnapshot::new(200, "b v1"));
        let m = manifest(&["/a.html", "/b.html"], &[]);
        precache(&store, &network, "pages-1", &m).await.unwrap();

        network.set("https://app.test/a.html", ResponseSnapshot::new(200, "a v2"));
        network.set("https://app.test/b.html", ResponseSnapshot::new(200, "b v2"));
        store.fail_puts_after(1);

        let err = precache(&store, &network, "pages-1", &m).await.unwrap_err();
        assert!(matches!(&err, Error::InstallFailed(urls) if urls.len() == 2));

        assert_eq!(store.keys().await.unwrap(), vec!["pages-1".to_string()]);
        let a = store.get("pages-1", &key("https://app.test/a.html")).await.unwrap().unwrap();
        let b = store.get("pages-1", &key("https://app.test/b.html")).await.unwrap().unwrap();
        assert_eq!(&a.body[..], b"a v1");
        assert_eq!(&b.body[..], b"b v1");
    }
}
