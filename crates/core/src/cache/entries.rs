//! Namespace and entry operations on the SQLite store.

use async_trait::async_trait;
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

use super::{CacheMatch, CacheStore};
use super::connection::CacheDb;
use crate::Error;
use crate::http::{CacheEntry, RequestKey, ResponseKind, ResponseSnapshot};

/// Raw columns of an entry row, decoded outside the row callback so that
/// JSON and kind errors surface as `CorruptEntry` rather than SQL errors.
struct EntryRow {
    status: i64,
    kind: String,
    headers_json: String,
    body: Vec<u8>,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self { status: row.get(0)?, kind: row.get(1)?, headers_json: row.get(2)?, body: row.get(3)? })
    }

    fn into_snapshot(self) -> Result<ResponseSnapshot, Error> {
        let status = u16::try_from(self.status).map_err(|_| Error::CorruptEntry(format!("status {}", self.status)))?;
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;
        Ok(ResponseSnapshot { status, headers, body: Bytes::from(self.body), kind: self.kind.parse()? })
    }
}

#[async_trait]
impl CacheStore for CacheDb {
    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM namespaces ORDER BY id ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn create(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO namespaces (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM namespaces WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, name: &str, entry: CacheEntry) -> Result<(), Error> {
        self.put_all(name, vec![entry]).await
    }

    /// Upsert in a single transaction: the namespace row and every entry
    /// row land together or not at all.
    async fn put_all(&self, name: &str, entries: Vec<CacheEntry>) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let rows = entries
            .into_iter()
            .map(|entry| Ok((serde_json::to_string(&entry.response.headers)?, entry)))
            .collect::<Result<Vec<(String, CacheEntry)>, Error>>()?;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO namespaces (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![name, now],
                )?;
                let namespace_id: i64 =
                    tx.query_row("SELECT id FROM namespaces WHERE name = ?1", params![name], |row| row.get(0))?;

                for (headers_json, entry) in &rows {
                    tx.execute(
                        "INSERT INTO entries (
                            namespace_id, key_hash, method, url, status, kind, headers_json, body, stored_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                        ON CONFLICT(namespace_id, key_hash) DO UPDATE SET
                            method = excluded.method,
                            url = excluded.url,
                            status = excluded.status,
                            kind = excluded.kind,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            stored_at = excluded.stored_at",
                        params![
                            namespace_id,
                            entry.key.hash(),
                            &entry.key.method,
                            &entry.key.url,
                            entry.response.status as i64,
                            entry.response.kind.as_str(),
                            headers_json,
                            entry.response.body.as_ref(),
                            &entry.stored_at,
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, name: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        let name = name.to_string();
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let row = conn
                    .query_row(
                        "SELECT e.status, e.kind, e.headers_json, e.body
                         FROM entries e JOIN namespaces n ON n.id = e.namespace_id
                         WHERE n.name = ?1 AND e.key_hash = ?2",
                        params![name, key_hash],
                        EntryRow::from_row,
                    )
                    .optional()?;

                row.map(EntryRow::into_snapshot).transpose()
            })
            .await
            .map_err(Error::from)
    }

    async fn match_any(&self, key: &RequestKey) -> Result<Option<CacheMatch>, Error> {
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<CacheMatch>, Error> {
                let row = conn
                    .query_row(
                        "SELECT e.status, e.kind, e.headers_json, e.body, n.name
                         FROM entries e JOIN namespaces n ON n.id = e.namespace_id
                         WHERE e.key_hash = ?1
                         ORDER BY n.id ASC LIMIT 1",
                        params![key_hash],
                        |row| Ok((EntryRow::from_row(row)?, row.get::<_, String>(4)?)),
                    )
                    .optional()?;

                let Some((entry, namespace)) = row else {
                    return Ok(None);
                };
                Ok(Some(CacheMatch { namespace, response: entry.into_snapshot()? }))
            })
            .await
            .map_err(Error::from)
    }

    async fn entries(&self, name: &str) -> Result<Vec<RequestKey>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.method, e.url
                     FROM entries e JOIN namespaces n ON n.id = e.namespace_id
                     WHERE n.name = ?1
                     ORDER BY e.rowid ASC",
                )?;
                let keys = stmt
                    .query_map(params![name], |row| Ok(RequestKey { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}

impl CacheDb {
    /// Total number of stored entries across all namespaces.
    pub async fn count_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
