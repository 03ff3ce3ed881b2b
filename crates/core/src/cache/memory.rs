//! In-memory cache store.
//!
//! Uses a Vec of namespaces behind a tokio RwLock so that namespace
//! creation order (and therefore `match_any` precedence) is preserved.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CacheMatch, CacheStore};
use crate::Error;
use crate::http::{CacheEntry, RequestKey, ResponseSnapshot};

#[derive(Debug, Default)]
struct MemoryNamespace {
    name: String,
    entries: Vec<CacheEntry>,
}

/// Cache store that lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    namespaces: Arc<RwLock<Vec<MemoryNamespace>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all namespaces.
    pub async fn len(&self) -> usize {
        self.namespaces.read().await.iter().map(|ns| ns.entries.len()).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.namespaces.read().await.iter().map(|ns| ns.name.clone()).collect())
    }

    async fn create(&self, name: &str) -> Result<(), Error> {
        let mut namespaces = self.namespaces.write().await;
        if !namespaces.iter().any(|ns| ns.name == name) {
            namespaces.push(MemoryNamespace { name: name.to_string(), entries: Vec::new() });
        }
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let mut namespaces = self.namespaces.write().await;
        let before = namespaces.len();
        namespaces.retain(|ns| ns.name != name);
        Ok(namespaces.len() != before)
    }

    async fn put(&self, name: &str, entry: CacheEntry) -> Result<(), Error> {
        self.put_all(name, vec![entry]).await
    }

    /// Applied under one write lock, so readers see all of the batch or none.
    async fn put_all(&self, name: &str, batch: Vec<CacheEntry>) -> Result<(), Error> {
        let mut namespaces = self.namespaces.write().await;
        let idx = match namespaces.iter().position(|ns| ns.name == name) {
            Some(idx) => idx,
            None => {
                namespaces.push(MemoryNamespace { name: name.to_string(), entries: Vec::new() });
                namespaces.len() - 1
            }
        };

        let entries = &mut namespaces[idx].entries;
        for entry in batch {
            match entries.iter_mut().find(|e| e.key == entry.key) {
                Some(existing) => *existing = entry,
                None => entries.push(entry),
            }
        }
        Ok(())
    }

    async fn get(&self, name: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .iter()
            .find(|ns| ns.name == name)
            .and_then(|ns| ns.entries.iter().find(|e| &e.key == key))
            .map(|e| e.response.clone()))
    }

    async fn match_any(&self, key: &RequestKey) -> Result<Option<CacheMatch>, Error> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.iter().find_map(|ns| {
            ns.entries
                .iter()
                .find(|e| &e.key == key)
                .map(|e| CacheMatch { namespace: ns.name.clone(), response: e.response.clone() })
        }))
    }

    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .iter()
            .find(|ns| ns.name == name)
            .map(|ns| ns.entries.iter().map(|e| e.key.clone()).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use url::Url;

    fn entry(url: &str, body: &'static str) -> CacheEntry {
        let url = Url::parse(url).unwrap();
        CacheEntry::new(RequestKey::get(&url), ResponseSnapshot::new(200, body))
    }

    #[tokio::test]
    async fn test_put_creates_namespace_lazily() {
        let store = MemoryStore::new();
        assert!(store.keys().await.unwrap().is_empty());

        store.put("pages-1", entry("https://app.test/a.html", "a")).await.unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["pages-1".to_string()]);
    }

    #[tokio::test]
    async fn test_put_overwrites_same_key() {
        let store = MemoryStore::new();
        store.put("pages-1", entry("https://app.test/a.html", "old")).await.unwrap();
        store.put("pages-1", entry("https://app.test/a.html", "new")).await.unwrap();

        assert_eq!(store.len().await, 1);
        let key = RequestKey::get(&Url::parse("https://app.test/a.html").unwrap());
        let hit = store.get("pages-1", &key).await.unwrap().unwrap();
        assert_eq!(&hit.body[..], b"new");
    }

    #[tokio::test]
    async fn test_match_any_prefers_oldest_namespace() {
        let store = MemoryStore::new();
        store.put("static-1", entry("https://app.test/x.js", "first")).await.unwrap();
        store.put("static-2", entry("https://app.test/x.js", "second")).await.unwrap();

        let key = RequestKey::get(&Url::parse("https://app.test/x.js").unwrap());
        let hit = store.match_any(&key).await.unwrap().unwrap();
        assert_eq!(hit.namespace, "static-1");
        assert_eq!(&hit.response.body[..], b"first");
    }

    #[tokio::test]
    async fn test_delete_all_except() {
        let store = MemoryStore::new();
        for name in ["pages-1", "static-1", "pages-2", "offline"] {
            store.create(name).await.unwrap();
        }

        let keep: HashSet<String> = ["pages-2".to_string(), "offline".to_string()].into();
        let report = store.delete_all_except(&keep).await.unwrap();

        assert_eq!(report.deleted, vec!["pages-1".to_string(), "static-1".to_string()]);
        assert_eq!(report.kept, vec!["pages-2".to_string(), "offline".to_string()]);
        assert!(report.failed.is_empty());
        assert_eq!(store.keys().await.unwrap(), vec!["pages-2".to_string(), "offline".to_string()]);
    }

    #[tokio::test]
    async fn test_open_handle() {
        let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
        let ns = store.open("pages-1").await.unwrap();
        ns.put(entry("https://app.test/b.html", "b")).await.unwrap();

        assert_eq!(ns.name(), "pages-1");
        assert_eq!(ns.keys().await.unwrap().len(), 1);
        assert!(store.delete("pages-1").await.unwrap());
        assert!(!store.delete("pages-1").await.unwrap());
    }
}
