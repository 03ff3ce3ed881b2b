//! Activation-time eviction of stale namespaces.

use std::collections::HashSet;

use crate::Error;
use crate::cache::{CacheStore, EvictionReport};
use crate::worker::namespace::CacheNames;

/// Delete every namespace that is neither current nor allow-listed.
///
/// Individual deletion failures are logged and reported, never returned;
/// only failing to enumerate the namespaces at all is an error.
pub async fn collect_garbage(
    store: &dyn CacheStore, current: &CacheNames, allow_list: &[String],
) -> Result<EvictionReport, Error> {
    let mut keep: HashSet<String> = allow_list.iter().cloned().collect();
    keep.insert(current.pages.clone());
    keep.insert(current.static_assets.clone());

    let report = store.delete_all_except(&keep).await?;

    for failure in &report.failed {
        tracing::warn!(namespace = %failure.namespace, reason = %failure.reason, "stale namespace not evicted");
    }
    if !report.deleted.is_empty() {
        tracing::info!(deleted = ?report.deleted, "evicted stale namespaces");
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::testing::FlakyStore;
    use crate::worker::namespace::VersionTag;

    #[tokio::test]
    async fn test_removes_other_versions_keeps_allow_list() {
        let store = MemoryStore::new();
        let v1 = CacheNames::for_version("lantern", &VersionTag::new("1"));
        let v2 = CacheNames::for_version("lantern", &VersionTag::new("2"));
        for name in [&v1.pages, &v1.static_assets, &v2.pages, &v2.static_assets] {
            store.create(name).await.unwrap();
        }
        store.create("lantern-offline").await.unwrap();
        store.create("christus-bible-v1").await.unwrap();

        let report = collect_garbage(&store, &v2, &["lantern-offline".to_string()]).await.unwrap();

        let remaining = store.keys().await.unwrap();
        assert_eq!(remaining, vec![v2.pages.clone(), v2.static_assets.clone(), "lantern-offline".to_string()]);
        assert_eq!(report.deleted.len(), 3);
        assert!(report.failed.is_empty());
    }

    #[tokio::test]
    async fn test_single_failure_does_not_stop_the_pass() {
        let store = FlakyStore::new();
        let current = CacheNames::for_version("lantern", &VersionTag::new("3"));
        for name in ["lantern-pages-1", "lantern-pages-2", "lantern-static-2"] {
            store.create(name).await.unwrap();
        }
        store.fail_delete_of("lantern-pages-1");

        let report = collect_garbage(&store, &current, &[]).await.unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].namespace, "lantern-pages-1");
        assert_eq!(report.deleted, vec!["lantern-pages-2".to_string(), "lantern-static-2".to_string()]);
        assert_eq!(store.keys().await.unwrap(), vec!["lantern-pages-1".to_string()]);
    }

    #[tokio::test]
    async fn test_nothing_to_collect() {
        let store = MemoryStore::new();
        let current = CacheNames::for_version("lantern", &VersionTag::new("1"));
        let report = collect_garbage(&store, &current, &[]).await.unwrap();
        assert_eq!(report, EvictionReport::default());
    }
}
