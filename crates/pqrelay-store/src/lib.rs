//! The store (C1): durable relational persistence of identities, prekeys,
//! and the offline queue, over an embedded, file-backed SQLite database
//! reached through an async-aware connection pool capped to a single
//! connection. That cap is what makes "the store is single-writer"
//! (§4.1, §5) a structural guarantee rather than a convention every caller
//! has to remember — two concurrent bundle fetches cannot observe each
//! other's uncommitted writes because there is only ever one connection to
//! serialize them through.

pub mod identity;
pub mod model;
pub mod prekey;
pub mod queue;

use sqlx::sqlite::{SqlitePoolOptions, SqliteConnectOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Store-layer fault taxonomy (A2): one enum, converted by callers into
/// whatever status code or `Ack` error fits their layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique-constraint violation on `handle` (registration of a
    /// handle that already exists).
    #[error("handle already registered")]
    Conflict,

    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

const SCHEMA_SQL: &str = r#"
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS identities (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    handle                TEXT NOT NULL UNIQUE,
    ik                    BLOB NOT NULL,
    spk                   BLOB NOT NULL,
    spk_id                INTEGER NOT NULL,
    spk_sig               BLOB NOT NULL,
    pqspk                 BLOB NOT NULL,
    pqspk_id              INTEGER NOT NULL,
    pqspk_sig             BLOB NOT NULL,
    notified_low_prekeys  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS opks (
    uid   INTEGER PRIMARY KEY AUTOINCREMENT,
    id    INTEGER NOT NULL,
    "for" INTEGER NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
    key   BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS pqopks (
    uid   INTEGER PRIMARY KEY AUTOINCREMENT,
    id    INTEGER NOT NULL,
    "for" INTEGER NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
    key   BLOB NOT NULL,
    sig   BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS queue (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    "for"      INTEGER NOT NULL REFERENCES identities(id) ON DELETE CASCADE,
    msg        BLOB NOT NULL,
    created_at INTEGER NOT NULL DEFAULT (strftime('%s','now'))
);

CREATE INDEX IF NOT EXISTS opks_for_idx ON opks("for", uid);
CREATE INDEX IF NOT EXISTS pqopks_for_idx ON pqopks("for", uid);
CREATE INDEX IF NOT EXISTS queue_for_idx ON queue("for", created_at, id);
"#;

/// The store handle passed from the host into the router and down into
/// every handler (§9 "process-wide store handle").
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if absent) the SQLite database at `path`, creates the
    /// schema idempotently, and returns a store capped to a single
    /// connection.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await?;

        tracing::info!(path, "store opened, schema ready");
        Ok(Self { pool })
    }

    /// In-memory store for tests: a fresh, empty schema, never persisted.
    #[doc(hidden)]
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::raw_sql(SCHEMA_SQL).execute(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_schema_on_a_fresh_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pqrelay.sqlite3");

        let store = Store::open(path.to_str().unwrap()).await.unwrap();
        let tables: Vec<(String,)> = sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(store.pool())
            .await
            .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();

        assert!(names.contains(&"identities"));
        assert!(names.contains(&"opks"));
        assert!(names.contains(&"pqopks"));
        assert!(names.contains(&"queue"));
    }

    #[tokio::test]
    async fn reopening_an_existing_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pqrelay.sqlite3");

        Store::open(path.to_str().unwrap()).await.unwrap();
        Store::open(path.to_str().unwrap()).await.unwrap();
    }
}
