use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::timestamp;
use crate::core::errors::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: String,
    pub name: String,
    pub pos_x: f64,
    pub pos_y: f64,
    pub pos_z: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMachine {
    pub name: String,
    #[serde(default)]
    pub pos_x: Option<f64>,
    #[serde(default)]
    pub pos_y: Option<f64>,
    #[serde(default)]
    pub pos_z: Option<f64>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub pos_x: Option<f64>,
    #[serde(default)]
    pub pos_y: Option<f64>,
    #[serde(default)]
    pub pos_z: Option<f64>,
}

#[derive(Clone)]
pub struct MachineStore {
    pool: SqlitePool,
}

impl MachineStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: NewMachine) -> Result<Machine, ApiError> {
        let machine = Machine {
            id: uuid::Uuid::new_v4().to_string(),
            name: validate_name(&input.name)?,
            pos_x: validate_coordinate("posX", input.pos_x.unwrap_or(0.0))?,
            pos_y: validate_coordinate("posY", input.pos_y.unwrap_or(0.0))?,
            pos_z: validate_coordinate("posZ", input.pos_z.unwrap_or(0.0))?,
            created_at: timestamp(),
        };

        sqlx::query(
            "INSERT INTO machines (id, name, pos_x, pos_y, pos_z, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&machine.id)
        .bind(&machine.name)
        .bind(machine.pos_x)
        .bind(machine.pos_y)
        .bind(machine.pos_z)
        .bind(&machine.created_at)
        .execute(&self.pool)
        .await?;

        tracing::info!("Created machine {} ({})", machine.id, machine.name);
        Ok(machine)
    }

    /// All machines, oldest first.
    pub async fn list(&self) -> Result<Vec<Machine>, ApiError> {
        let rows = sqlx::query("SELECT * FROM machines ORDER BY created_at ASC, rowid ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(row_to_machine)
            .collect::<Result<Vec<_>, _>>()
            .map_err(ApiError::from)
    }

    pub async fn get(&self, id: &str) -> Result<Option<Machine>, ApiError> {
        let row = sqlx::query("SELECT * FROM machines WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(row_to_machine).transpose()?)
    }

    pub async fn update(&self, id: &str, update: MachineUpdate) -> Result<Option<Machine>, ApiError> {
        let Some(mut machine) = self.get(id).await? else {
            return Ok(None);
        };

        if let Some(name) = update.name {
            machine.name = validate_name(&name)?;
        }
        if let Some(x) = update.pos_x {
            machine.pos_x = validate_coordinate("posX", x)?;
        }
        if let Some(y) = update.pos_y {
            machine.pos_y = validate_coordinate("posY", y)?;
        }
        if let Some(z) = update.pos_z {
            machine.pos_z = validate_coordinate("posZ", z)?;
        }

        let result = sqlx::query("UPDATE machines SET name = ?, pos_x = ?, pos_y = ?, pos_z = ? WHERE id = ?")
            .bind(&machine.name)
            .bind(machine.pos_x)
            .bind(machine.pos_y)
            .bind(machine.pos_z)
            .bind(id)
            .execute(&self.pool)
            .await?;

        // Deleted between the read and the write.
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(machine))
    }

    /// `false` when no machine had this id.
    pub async fn delete(&self, id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM machines WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn row_to_machine(row: &SqliteRow) -> Result<Machine, sqlx::Error> {
    Ok(Machine {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        pos_x: row.try_get("pos_x")?,
        pos_y: row.try_get("pos_y")?,
        pos_z: row.try_get("pos_z")?,
        created_at: row.try_get("created_at")?,
    })
}

fn validate_name(name: &str) -> Result<String, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

fn validate_coordinate(field: &str, value: f64) -> Result<f64, ApiError> {
    if !value.is_finite() {
        return Err(ApiError::BadRequest(format!("{} must be a finite number", field)));
    }
    Ok(value)
}
