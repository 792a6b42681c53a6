// src/store/sqlite.rs
//! SQLite document store.
//!
//! One `documents` table keyed by `(id, kind)`; the full document is kept as
//! JSON next to the columns used for filtering. rusqlite is synchronous, so
//! every call runs on the blocking pool behind a shared connection lock.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::{debug, info};

use super::{
    ensure_key_matches, DocFilter, DocumentStore, FindQuery, SortOrder, UpsertOutcome,
};
use crate::error::{StoreError, StoreResult};
use crate::ingest::types::{EnrichedItem, ItemKey};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id          TEXT    NOT NULL,
    kind        TEXT    NOT NULL,
    subreddit   TEXT    NOT NULL,
    fetched_at  INTEGER NOT NULL,
    doc         TEXT    NOT NULL,
    PRIMARY KEY (id, kind)
);
CREATE INDEX IF NOT EXISTS idx_documents_fetched_at ON documents (fetched_at);
CREATE INDEX IF NOT EXISTS idx_documents_kind ON documents (kind);
";

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens a database file, or an in-memory database for `":memory:"`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = if path.to_str() == Some(":memory:") {
            Connection::open_in_memory()?
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::Backend(format!("creating {}: {e}", parent.display()))
                    })?;
                }
            }
            let conn = Connection::open(path)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
            conn
        };
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;
        info!(target: "store", path = %path.display(), "sqlite store ready");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> StoreResult<Self> {
        Self::open(":memory:")
    }

    async fn run<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("blocking task: {e}")))?
    }
}

/// WHERE clause plus positional values for a filter.
fn where_clause(filter: &DocFilter) -> (String, Vec<Value>) {
    let mut parts: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    if let Some(k) = filter.kind {
        parts.push("kind = ?");
        values.push(Value::Text(k.as_str().to_string()));
    }
    if let Some(s) = &filter.subreddit {
        parts.push("subreddit = ?");
        values.push(Value::Text(s.clone()));
    }
    if let Some(ts) = filter.fetched_since {
        parts.push("fetched_at >= ?");
        values.push(Value::Integer(ts.timestamp_millis()));
    }
    if parts.is_empty() {
        (String::new(), values)
    } else {
        (format!(" WHERE {}", parts.join(" AND ")), values)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn upsert(&self, key: &ItemKey, doc: &EnrichedItem) -> StoreResult<UpsertOutcome> {
        ensure_key_matches(key, doc)?;
        let id = key.id.clone();
        let kind = key.kind.as_str();
        let subreddit = doc.item.subreddit().to_string();
        let fetched_at = doc.item.fetched_at().timestamp_millis();
        let json = serde_json::to_string(doc)?;

        self.run(move |conn| {
            let tx = conn.transaction()?;
            let existed: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM documents WHERE id = ?1 AND kind = ?2)",
                params![id, kind],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO documents (id, kind, subreddit, fetched_at, doc)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (id, kind) DO UPDATE SET
                    subreddit = excluded.subreddit,
                    fetched_at = excluded.fetched_at,
                    doc = excluded.doc",
                params![id, kind, subreddit, fetched_at, json],
            )?;
            tx.commit()?;
            debug!(target: "store", %id, kind, existed, "upsert");
            Ok(if existed {
                UpsertOutcome::Updated
            } else {
                UpsertOutcome::Inserted
            })
        })
        .await
    }

    async fn get(&self, key: &ItemKey) -> StoreResult<Option<EnrichedItem>> {
        let id = key.id.clone();
        let kind = key.kind.as_str();
        self.run(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT doc FROM documents WHERE id = ?1 AND kind = ?2",
                    params![id, kind],
                    |row| row.get(0),
                )
                .optional()?;
            match raw {
                Some(s) => Ok(Some(serde_json::from_str(&s)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn count(&self, filter: &DocFilter) -> StoreResult<u64> {
        let (clause, values) = where_clause(filter);
        self.run(move |conn| {
            let sql = format!("SELECT COUNT(*) FROM documents{clause}");
            let n: i64 = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
            Ok(n.max(0) as u64)
        })
        .await
    }

    async fn find(&self, query: &FindQuery) -> StoreResult<Vec<EnrichedItem>> {
        let (clause, mut values) = where_clause(&query.filter);
        let order = match query.sort {
            SortOrder::NewestFirst => "fetched_at DESC, id DESC, kind DESC",
            SortOrder::OldestFirst => "fetched_at ASC, id ASC, kind ASC",
        };
        // SQLite wants a LIMIT before OFFSET; -1 means unbounded.
        let limit = query.limit.map(|l| l as i64).unwrap_or(-1);
        values.push(Value::Integer(limit));
        values.push(Value::Integer(query.skip as i64));

        self.run(move |conn| {
            let sql = format!("SELECT doc FROM documents{clause} ORDER BY {order} LIMIT ? OFFSET ?");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for raw in rows {
                out.push(serde_json::from_str(&raw?)?);
            }
            Ok(out)
        })
        .await
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}
