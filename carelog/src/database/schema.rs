//! Database schema and migrations
//!
//! Migrations are numbered SQL files applied in order, each in its own
//! transaction and recorded in the `migrations` table. After migrating, the
//! keys that make revision and subgoal numbering safe under concurrent
//! writers are checked, so a database altered by hand fails at startup
//! instead of silently accepting duplicate versions.

use crate::error::{AppError, Result};
use sqlx::{sqlite::SqlitePool, Row};

const MIGRATIONS: &[(i32, &str)] = &[
    (1, include_str!("migrations/001_initial_schema.sql")),
    (2, include_str!("migrations/002_schedules.sql")),
];

/// Keys that must exist: (table, columns in key order)
const REQUIRED_PRIMARY_KEYS: &[(&str, &[&str])] = &[("log_revisions", &["log_id", "version"])];

const REQUIRED_UNIQUE_KEYS: &[(&str, &[&str])] = &[
    ("goal_subgoals", &["goal_id", "order_index"]),
    ("schedule_participants", &["schedule_id", "client_id"]),
];

/// Bring the schema up to date and check its keys
pub async fn initialize_database(pool: &SqlitePool) -> Result<()> {
    tracing::info!("Initializing database schema");

    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    let current = schema_version(pool).await?;
    tracing::info!("Current database version: {}", current);

    for (version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
        apply_migration(pool, *version, sql).await?;
    }

    verify_schema(pool).await?;

    tracing::info!("Database initialization complete");
    Ok(())
}

/// Highest applied migration, 0 for a fresh database
pub async fn schema_version(pool: &SqlitePool) -> Result<i32> {
    let version = sqlx::query("SELECT COALESCE(MAX(version), 0) FROM migrations")
        .fetch_one(pool)
        .await?
        .get(0);

    Ok(version)
}

async fn apply_migration(pool: &SqlitePool, version: i32, sql: &str) -> Result<()> {
    tracing::info!("Applying migration version {}", version);

    let mut tx = pool.begin().await?;

    // Migration files contain no semicolons outside statement ends
    for statement in sql.split(';').filter(|s| !s.trim().is_empty()) {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    sqlx::query("INSERT INTO migrations (version) VALUES (?)")
        .bind(version)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!("Migration version {} applied successfully", version);
    Ok(())
}

/// Fail unless every key numbering depends on is present
pub async fn verify_schema(pool: &SqlitePool) -> Result<()> {
    for (table, columns) in REQUIRED_PRIMARY_KEYS {
        let key: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk")
                .bind(*table)
                .fetch_all(pool)
                .await?;

        if key != *columns {
            return Err(AppError::Schema(format!(
                "{} must have primary key ({}), found ({})",
                table,
                columns.join(", "),
                key.join(", ")
            )));
        }
    }

    for (table, columns) in REQUIRED_UNIQUE_KEYS {
        if !has_unique_index(pool, table, columns).await? {
            return Err(AppError::Schema(format!(
                "{} must be unique on ({})",
                table,
                columns.join(", ")
            )));
        }
    }

    Ok(())
}

async fn has_unique_index(pool: &SqlitePool, table: &str, columns: &[&str]) -> Result<bool> {
    let indexes: Vec<String> =
        sqlx::query_scalar(r#"SELECT name FROM pragma_index_list(?) WHERE "unique" = 1"#)
            .bind(table)
            .fetch_all(pool)
            .await?;

    for index in indexes {
        let indexed: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_index_info(?) ORDER BY seqno")
                .bind(&index)
                .fetch_all(pool)
                .await?;

        if indexed == columns {
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_initialize_database() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();

        assert_eq!(schema_version(&pool).await.unwrap(), MIGRATIONS.len() as i32);

        for table in [
            "profiles",
            "clients",
            "log_notes",
            "log_revisions",
            "goals",
            "goal_subgoals",
            "schedules",
            "schedule_participants",
        ] {
            let count: i32 = sqlx::query_scalar(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&pool)
            .await
            .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();
        initialize_database(&pool).await.unwrap();

        let applied: i32 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(applied, MIGRATIONS.len() as i32);
    }

    #[tokio::test]
    async fn test_upgrade_from_first_version() {
        let pool = memory_pool().await;

        sqlx::query("CREATE TABLE migrations (version INTEGER PRIMARY KEY, applied_at TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        apply_migration(&pool, 1, MIGRATIONS[0].1).await.unwrap();
        assert_eq!(schema_version(&pool).await.unwrap(), 1);

        initialize_database(&pool).await.unwrap();
        assert_eq!(schema_version(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let pool = memory_pool().await;

        initialize_database(&pool).await.unwrap();

        let foreign_keys: i32 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert_eq!(foreign_keys, 1);
    }

    #[tokio::test]
    async fn test_verify_rejects_revisions_without_version_key() {
        let pool = memory_pool().await;
        initialize_database(&pool).await.unwrap();

        sqlx::query("DROP TABLE log_revisions").execute(&pool).await.unwrap();
        sqlx::query(
            "CREATE TABLE log_revisions (log_id TEXT NOT NULL, version INTEGER NOT NULL, content TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let result = verify_schema(&pool).await;
        assert!(matches!(result, Err(AppError::Schema(msg)) if msg.contains("log_revisions")));
    }

    #[tokio::test]
    async fn test_verify_rejects_missing_subgoal_order_key() {
        let pool = memory_pool().await;
        initialize_database(&pool).await.unwrap();

        sqlx::query("DROP TABLE goal_subgoals").execute(&pool).await.unwrap();
        sqlx::query(
            "CREATE TABLE goal_subgoals (id TEXT PRIMARY KEY, goal_id TEXT, order_index INTEGER)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let result = verify_schema(&pool).await;
        assert!(matches!(result, Err(AppError::Schema(msg)) if msg.contains("goal_subgoals")));
    }
}
