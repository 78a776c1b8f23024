//! Persistence layer for task records.
//!
//! [`TaskStore`] is the record-store contract: one value is one unit of work.
//! Mutations are staged inside a single transaction and only become visible
//! on [`TaskStore::commit`]. [`SqliteStore`] owns the connection pool and
//! hands out [`SqliteTaskSession`]s through [`SessionFactory`]; to swap the
//! database, implement both traits for the new backend and change the
//! concrete type in the server state.

pub mod task;

pub use task::{SqliteTaskSession, TaskStore};

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Hands out fresh store sessions, one per logical operation.
pub trait SessionFactory: Clone + Send + Sync + 'static {
    type Session: TaskStore;

    fn session(&self) -> Self::Session;
}

/// SQLite-backed task store.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://tasklet.db"`.
    /// Use [`SqliteStore::connect_in_memory`] for a private in-memory database.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        Self::migrate(pool).await
    }

    /// A private in-memory database.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn connect_in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Round-trip a trivial query to prove the database is reachable.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl SessionFactory for SqliteStore {
    type Session = SqliteTaskSession;

    fn session(&self) -> SqliteTaskSession {
        SqliteTaskSession::new(self.pool.clone())
    }
}
