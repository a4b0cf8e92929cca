//! Database module
//!
//! SQLite storage for profiles, clients, logs, goals and schedules.
//! Every connection enforces foreign keys, since deleting a client relies on
//! cascades to remove its logs, revisions, goals and schedule entries.

pub mod models;
pub mod repository;
pub mod schema;

pub use models::*;
pub use repository::Repository;
pub use schema::{initialize_database, schema_version, verify_schema};

use crate::config::{DATABASE_BUSY_TIMEOUT_SECS, DATABASE_MAX_CONNECTIONS};
use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Options for a database file, created on first use
fn file_options(db_path: &Path) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
    let opts = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(DATABASE_BUSY_TIMEOUT_SECS))
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    Ok(opts)
}

/// Open the database file at `db_path`, migrating it first.
///
/// Migrations and the schema check run on a single connection that is
/// closed before the application pool opens, so no pooled connection ever
/// holds a pre-migration schema.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::info!("Opening database at: {:?}", db_path);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let migration_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(file_options(db_path)?)
        .await?;

    initialize_database(&migration_pool).await?;
    migration_pool.close().await;

    let pool = SqlitePoolOptions::new()
        .max_connections(DATABASE_MAX_CONNECTIONS)
        .connect_with(file_options(db_path)?)
        .await?;

    tracing::info!(
        "Database ready with up to {} connections",
        DATABASE_MAX_CONNECTIONS
    );

    Ok(pool)
}

/// Migrated in-memory database.
///
/// Each in-memory connection is its own database, so the pool holds exactly
/// one connection and never recycles it.
pub async fn create_memory_pool() -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await?;

    initialize_database(&pool).await?;

    Ok(pool)
}
