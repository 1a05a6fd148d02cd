//! SQLite-backed persistence for Netwarden.
//!
//! Mirrors the approach of a connection-pooled async store: one pool shared
//! by every caller, WAL journaling for reader/writer concurrency, and short,
//! explicit transactions per logical operation. No caller is ever handed a
//! connection that outlives its own call — the concurrency contract in the
//! spec forbids threading a session handle across worker boundaries.

mod artifacts;
mod hosts;
mod row;
mod schedules;
mod schema;
mod scans;
mod settings;
mod stats;
mod users;

pub use hosts::ServiceGroup;
pub use stats::Stats;

use netwarden_core::{Error, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{ConnectOptions, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Handle to the durable store. Cheap to clone (it wraps a pool); every
/// background worker, HTTP handler, and scheduled job should hold its own
/// clone rather than share one through a mutex.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Opens (creating if necessary) the SQLite database at `database_url`
    /// and applies the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| Error::Store(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(10))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .connect_with(options)
            .await
            .map_err(|e| Error::Store(format!("failed to open database: {e}")))?;

        let store = Store { pool };
        store.migrate().await?;
        info!(%database_url, "store connected");
        Ok(store)
    }

    /// In-memory store, used by tests.
    pub async fn connect_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> Result<()> {
        debug!("applying schema");
        sqlx::query(schema::SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        self.settings_set_if_absent(
            netwarden_core::setting_keys::SCHEMA_VERSION,
            &schema::SCHEMA_VERSION.to_string(),
        )
        .await?;
        Ok(())
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Maps a `sqlx::Error` onto the shared `Error::Store` variant. Every query
/// method in this crate funnels through this so callers never see `sqlx`
/// types.
pub(crate) fn map_sqlx(err: sqlx::Error) -> Error {
    Error::Store(err.to_string())
}
