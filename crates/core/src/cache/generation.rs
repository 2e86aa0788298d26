//! Cache generations and their entries.
//!
//! A generation is a named container mapping request keys to stored
//! responses. The cache agent keeps exactly one generation current and
//! purges the rest on activation.

use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use tokio_rusqlite::{params, rusqlite};
use url::Url;

use super::connection::CacheDb;
use super::key::RequestKey;
use crate::Error;

/// Snapshot of a response as it was when stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    /// Final URL the response was served from.
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl StoredResponse {
    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Handle to one named generation inside a [`CacheDb`].
#[derive(Clone, Debug)]
pub struct Generation {
    db: CacheDb,
    name: Arc<str>,
}

impl CacheDb {
    /// Open (or create) the generation called `name`.
    pub async fn open_generation(&self, name: &str) -> Result<Generation, Error> {
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("generation name must not be empty".into()));
        }

        let owned = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![owned, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(Generation { db: self.clone(), name: Arc::from(name) })
    }

    /// Names of all generations, oldest first.
    pub async fn generations(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at, name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a generation exists.
    pub async fn has_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and every entry it holds.
    ///
    /// Returns false if no such generation existed.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM entries WHERE generation = ?1", params![name])?;
                let removed = tx.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                tx.commit()?;
                Ok(removed > 0)
            })
            .await
            .map_err(Error::from)
    }
}

fn upsert(conn: &rusqlite::Connection, generation: &str, key: &RequestKey, response: &StoredResponse) -> Result<(), Error> {
    let headers_json = serde_json::to_string(&response.headers)?;
    conn.execute(
        "INSERT INTO entries (generation, key_hash, method, url, status, headers_json, body, stored_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(generation, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            status = excluded.status,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation,
            key.hash(),
            key.method().as_str(),
            key.url().as_str(),
            response.status,
            headers_json,
            &response.body[..],
            chrono::Utc::now().to_rfc3339(),
        ],
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation => {
            Error::UnknownGeneration(generation.to_string())
        }
        e => Error::from(e),
    })?;
    Ok(())
}

impl Generation {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the stored response for `key`.
    ///
    /// Returns None if this generation holds no entry for the request.
    pub async fn match_request(&self, key: &RequestKey) -> Result<Option<StoredResponse>, Error> {
        let generation = self.name.to_string();
        let hash = key.hash();
        self.db
            .conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT url, status, headers_json, body
                    FROM entries WHERE generation = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![generation, hash], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, u16>(1)?, row.get::<_, String>(2)?, row.get::<_, Vec<u8>>(3)?))
                });

                match result {
                    Ok((url, status, headers_json, body)) => Ok(Some(StoredResponse {
                        url,
                        status,
                        headers: serde_json::from_str(&headers_json)?,
                        body: Bytes::from(body),
                    })),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Store `response` under `key`, overwriting any previous entry.
    pub async fn put(&self, key: &RequestKey, response: &StoredResponse) -> Result<(), Error> {
        let generation = self.name.to_string();
        let key = key.clone();
        let response = response.clone();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> { upsert(conn, &generation, &key, &response) })
            .await
            .map_err(Error::from)
    }

    /// Store several entries in one transaction: either all land or none do.
    pub async fn put_all(&self, entries: Vec<(RequestKey, StoredResponse)>) -> Result<(), Error> {
        let generation = self.name.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for (key, response) in &entries {
                    upsert(&tx, &generation, key, response)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Every request stored in this generation, ordered by URL.
    pub async fn keys(&self) -> Result<Vec<RequestKey>, Error> {
        let generation = self.name.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<RequestKey>, Error> {
                let mut stmt =
                    conn.prepare("SELECT method, url FROM entries WHERE generation = ?1 ORDER BY url, method")?;
                let rows = stmt
                    .query_map(params![generation], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(method, url)| {
                        let method = Method::from_bytes(method.as_bytes())
                            .map_err(|e| Error::InvalidInput(format!("stored method {method}: {e}")))?;
                        let url = Url::parse(&url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
                        Ok(RequestKey::new(method, url))
                    })
                    .collect()
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries in this generation.
    pub async fn len(&self) -> Result<usize, Error> {
        let generation = self.name.to_string();
        self.db
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM entries WHERE generation = ?1", params![generation], |row| {
                        row.get(0)
                    })?;
                Ok(count as usize)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> RequestKey {
        RequestKey::get(Url::parse("https://site.example").unwrap().join(path).unwrap())
    }

    fn response(body: &'static str) -> StoredResponse {
        StoredResponse {
            url: "https://site.example/".into(),
            status: 200,
            headers: vec![("Content-Type".into(), "text/html".into())],
            body: Bytes::from_static(body.as_bytes()),
        }
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = db.open_generation("crawlgate-v1").await.unwrap();

        generation.put(&key("/"), &response("<html>home</html>")).await.unwrap();

        let hit = generation.match_request(&key("/")).await.unwrap().unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"<html>home</html>"));
        assert_eq!(hit.status, 200);
        assert_eq!(hit.header("content-type"), Some("text/html"));
    }

    #[tokio::test]
    async fn test_match_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = db.open_generation("crawlgate-v1").await.unwrap();
        assert!(generation.match_request(&key("/nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_in_place() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = db.open_generation("crawlgate-v1").await.unwrap();

        generation.put(&key("/a"), &response("old")).await.unwrap();
        generation.put(&key("/a"), &response("new")).await.unwrap();

        assert_eq!(generation.len().await.unwrap(), 1);
        let hit = generation.match_request(&key("/a")).await.unwrap().unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"new"));
    }

    #[tokio::test]
    async fn test_generations_are_isolated() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let old = db.open_generation("crawlgate-v1").await.unwrap();
        let new = db.open_generation("crawlgate-v2").await.unwrap();

        old.put(&key("/"), &response("v1")).await.unwrap();

        assert!(new.match_request(&key("/")).await.unwrap().is_none());
        assert_eq!(db.generations().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delete_generation_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let old = db.open_generation("crawlgate-v1").await.unwrap();
        old.put(&key("/"), &response("v1")).await.unwrap();

        assert!(db.delete_generation("crawlgate-v1").await.unwrap());
        assert!(!db.delete_generation("crawlgate-v1").await.unwrap());
        assert!(!db.has_generation("crawlgate-v1").await.unwrap());

        let reopened = db.open_generation("crawlgate-v1").await.unwrap();
        assert_eq!(reopened.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_put_into_deleted_generation_fails() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = db.open_generation("crawlgate-v1").await.unwrap();
        db.delete_generation("crawlgate-v1").await.unwrap();

        let result = generation.put(&key("/"), &response("orphan")).await;
        assert!(matches!(result, Err(Error::UnknownGeneration(ref name)) if name == "crawlgate-v1"));
    }

    #[tokio::test]
    async fn test_put_all_and_keys() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = db.open_generation("crawlgate-v1").await.unwrap();

        generation
            .put_all(vec![(key("/manifest.json"), response("{}")), (key("/"), response("home"))])
            .await
            .unwrap();

        let keys = generation.keys().await.unwrap();
        let paths: Vec<&str> = keys.iter().map(|k| k.url().path()).collect();
        assert_eq!(paths, vec!["/", "/manifest.json"]);
    }

    #[tokio::test]
    async fn test_empty_generation_name_rejected() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(matches!(db.open_generation("").await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_concurrent_puts_same_key() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let generation = db.open_generation("crawlgate-v1").await.unwrap();

        let writers: Vec<_> = (0..16)
            .map(|i| {
                let generation = generation.clone();
                tokio::spawn(async move {
                    let body = Bytes::from(format!("body-{i}"));
                    let stored = StoredResponse { body, ..response("") };
                    generation.put(&key("/hot"), &stored).await
                })
            })
            .collect();

        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        assert_eq!(generation.len().await.unwrap(), 1);
        let hit = generation.match_request(&key("/hot")).await.unwrap().unwrap();
        assert!(String::from_utf8_lossy(&hit.body).starts_with("body-"));
    }
}
