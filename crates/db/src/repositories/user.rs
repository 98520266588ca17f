use chrono::Utc;
use sqlx::Row;

use caseflow_core::domain::principal::Role;
use caseflow_core::domain::request::UserId;

use super::{RepositoryError, UserDirectory, UserRecord};
use crate::DbPool;

pub struct SqlUserDirectory {
    pool: DbPool,
}

impl SqlUserDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Idempotent write used by seeding; role changes on re-seed win.
    pub async fn upsert(&self, record: &UserRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO users (id, name, email, role, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 role = excluded.role",
        )
        .bind(&record.id.0)
        .bind(&record.name)
        .bind(&record.email)
        .bind(record.role.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<UserRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: String =
        row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role: String = row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(UserRecord {
        id: UserId(id),
        name,
        email,
        role: role.parse::<Role>().map_err(|e| RepositoryError::Decode(e.to_string()))?,
    })
}

#[async_trait::async_trait]
impl UserDirectory for SqlUserDirectory {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, email, role FROM users WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_record(r)?)),
            None => Ok(None),
        }
    }
}
