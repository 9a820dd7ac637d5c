//! SQLite persistence for machines and operator logs.

pub mod logs;
pub mod machines;

use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::core::config::DatabaseConfig;
use crate::core::errors::ApiError;

pub use logs::{LogEntry, LogStore, NewLog};
pub use machines::{Machine, MachineStore, MachineUpdate, NewMachine};

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| ApiError::internal(format!("Invalid database url '{}': {}", config.url, e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to database: {}", e)))?;

        let db = Self { pool };
        db.migrate().await?;
        tracing::info!("Database ready at {}", config.url);
        Ok(db)
    }

    async fn migrate(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS machines (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                pos_x REAL NOT NULL DEFAULT 0,
                pos_y REAL NOT NULL DEFAULT 0,
                pos_z REAL NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init machines table: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS logs (
                id TEXT PRIMARY KEY,
                message TEXT NOT NULL,
                level TEXT NOT NULL,
                machine_id TEXT,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init logs table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_logs_machine_id ON logs(machine_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create index: {}", e)))?;

        Ok(())
    }

    pub fn machines(&self) -> MachineStore {
        MachineStore::new(self.pool.clone())
    }

    pub fn logs(&self) -> LogStore {
        LogStore::new(self.pool.clone())
    }
}

/// Fixed-width RFC 3339 so timestamps sort lexicographically.
pub(crate) fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
