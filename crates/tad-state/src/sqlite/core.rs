use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::PathBuf;

pub struct SqliteDatabase {
    pub(super) pool: SqlitePool,
}

fn sqlite_database_file_path(database_url: &str) -> Option<PathBuf> {
    let raw = if let Some(rest) = database_url.strip_prefix("sqlite://") {
        rest
    } else if let Some(rest) = database_url.strip_prefix("sqlite:") {
        rest
    } else {
        database_url
    };

    let path = raw.split('?').next().unwrap_or(raw);
    if path.is_empty() || path == ":memory:" || path.starts_with("file:") {
        return None;
    }

    Some(PathBuf::from(path))
}

/// RFC 3339 with millisecond precision, matching the STRFTIME defaults used
/// by the schema so stored timestamps stay mutually comparable.
pub(super) fn fmt_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl SqliteDatabase {
    pub async fn new(database_url: &str) -> Result<Self> {
        let file_path = sqlite_database_file_path(database_url);
        if let Some(path) = &file_path {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!(
                            "Failed to create SQLite database directory: {}",
                            parent.display()
                        )
                    })?;
                }
            }
        }

        // An in-memory SQLite database is private to its connection, so a
        // multi-connection pool would see missing tables.
        let max_connections = if file_path.is_some() { 5 } else { 1 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(database_url)
            .await?;

        // Enable foreign keys
        sqlx::query("PRAGMA foreign_keys = ON;").execute(&pool).await?;

        if file_path.is_some() {
            // WAL allows concurrent reads during writes
            sqlx::query("PRAGMA journal_mode = WAL;").execute(&pool).await?;
            sqlx::query("PRAGMA synchronous = NORMAL;").execute(&pool).await?;
        }

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations_sqlite").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
