//! Worker scope: the origin and base path the cache manager controls.

use url::Url;

use crate::Error;

/// The URL a worker is registered under.
///
/// Manifest entries such as `./app/home.html` are resolved against it, and
/// its origin decides which requests are intercepted at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    url: Url,
}

impl Scope {
    /// Parse a scope URL. Only http(s) is accepted; a missing trailing slash
    /// is added so relative resolution stays inside the scope directory.
    pub fn parse(input: &str) -> Result<Self, Error> {
        let mut url = Url::parse(input.trim()).map_err(|e| Error::InvalidUrl(format!("{input}: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidUrl(format!("unsupported scope scheme: {scheme}"))),
        }

        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Resolve a relative-or-absolute URL against the scope.
    ///
    /// This is the one canonical form for cache keys, used for manifest
    /// entries and intercepted requests alike:
    /// 1. Trim leading/trailing whitespace
    /// 2. Resolve relative input (`./app/home.html`, `/data.csv`)
    /// 3. Lowercase the host
    /// 4. Remove the fragment, keep the query string as is
    pub fn resolve(&self, entry: &str) -> Result<Url, Error> {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidUrl("empty URL".into()));
        }

        let mut url = self
            .url
            .join(trimmed)
            .map_err(|e| Error::InvalidUrl(format!("{trimmed}: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::InvalidUrl(format!("unsupported scheme: {scheme}"))),
        }

        url.set_fragment(None);
        Ok(url)
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.url.origin()
    }
}
