use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::timestamp;
use crate::core::errors::ApiError;

pub const DEFAULT_LEVEL: &str = "info";
pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub message: String,
    pub level: String,
    pub machine_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLog {
    pub message: String,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub machine_id: Option<String>,
}

#[derive(Clone)]
pub struct LogStore {
    pool: SqlitePool,
}

impl LogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: NewLog) -> Result<LogEntry, ApiError> {
        if input.message.trim().is_empty() {
            return Err(ApiError::BadRequest("message must not be empty".to_string()));
        }
        let level = input
            .level
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());

        let entry = LogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            message: input.message,
            level,
            machine_id: input.machine_id.filter(|id| !id.trim().is_empty()),
            created_at: timestamp(),
        };

        sqlx::query(
            "INSERT INTO logs (id, message, level, machine_id, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(&entry.message)
        .bind(&entry.level)
        .bind(&entry.machine_id)
        .bind(&entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Newest first, optionally restricted to one machine. `limit` is
    /// clamped to `[1, MAX_LIST_LIMIT]`.
    pub async fn list(&self, machine_id: Option<&str>, limit: usize) -> Result<Vec<LogEntry>, ApiError> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT) as i64;
        let rows = match machine_id {
            Some(id) => {
                sqlx::query(
                    "SELECT * FROM logs WHERE machine_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
                )
                .bind(id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM logs ORDER BY created_at DESC, rowid DESC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter()
            .map(row_to_entry)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApiError::from)
    }
}

fn row_to_entry(row: &SqliteRow) -> Result<LogEntry, sqlx::Error> {
    Ok(LogEntry {
        id: row.try_get("id")?,
        message: row.try_get("message")?,
        level: row.try_get("level")?,
        machine_id: row.try_get("machine_id")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_database;

    fn log(message: &str, machine_id: Option<&str>) -> NewLog {
        NewLog {
            message: message.to_string(),
            level: None,
            machine_id: machine_id.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn level_defaults_to_info() {
        let (db, _dir) = temp_database().await;
        let store = db.logs();

        let entry = store.create(log("Belt restarted", Some("m-1"))).await.unwrap();
        assert_eq!(entry.level, "info");
        assert_eq!(entry.machine_id.as_deref(), Some("m-1"));

        let warn = store
            .create(NewLog {
                level: Some("WARN".into()),
                ..log("Jam detected", None)
            })
            .await
            .unwrap();
        assert_eq!(warn.level, "warn");
    }

    #[tokio::test]
    async fn blank_message_is_rejected() {
        let (db, _dir) = temp_database().await;
        assert!(matches!(
            db.logs().create(log("  ", None)).await,
            Err(ApiError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn list_is_newest_first_filtered_and_limited() {
        let (db, _dir) = temp_database().await;
        let store = db.logs();
        store.create(log("one", Some("m-1"))).await.unwrap();
        store.create(log("two", Some("m-2"))).await.unwrap();
        store.create(log("three", Some("m-1"))).await.unwrap();

        let all: Vec<String> = store
            .list(None, DEFAULT_LIST_LIMIT)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(all, vec!["three", "two", "one"]);

        let m1: Vec<String> = store
            .list(Some("m-1"), DEFAULT_LIST_LIMIT)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.message)
            .collect();
        assert_eq!(m1, vec!["three", "one"]);

        assert_eq!(store.list(None, 1).await.unwrap().len(), 1);
        assert_eq!(store.list(None, 0).await.unwrap().len(), 1);
    }
}
