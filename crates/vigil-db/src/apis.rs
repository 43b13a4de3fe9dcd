//! Apis repository - upserts of the upstream catalogue

use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use vigil_core::{ApiEntry, Error, Result};

/// Upsert keyed on `name`. The insert timestamp survives updates.
const UPSERT_SQL: &str = r#"
    INSERT INTO apis (name, description, category)
    VALUES (?, ?, ?)
    ON CONFLICT(name) DO UPDATE SET
        description = excluded.description,
        category = excluded.category
"#;

/// A row of the `apis` table
#[derive(Debug, Clone, PartialEq)]
pub struct StoredApi {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub timestamp: String,
}

/// Repository for apis operations
pub struct ApisRepository {
    pool: SqlitePool,
}

impl ApisRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert every entry inside one transaction. Either all entries are
    /// applied or none are.
    pub async fn upsert_batch(&self, entries: &[ApiEntry]) -> Result<usize> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        for entry in entries {
            sqlx::query(UPSERT_SQL)
                .bind(&entry.name)
                .bind(&entry.description)
                .bind(&entry.category)
                .execute(&mut *tx)
                .await
                .map_err(|e| Error::DbError(format!("upsert '{}': {}", entry.name, e)))?;
        }

        tx.commit().await.map_err(|e| Error::DbError(e.to_string()))?;
        Ok(entries.len())
    }

    /// Get an entry by name
    pub async fn get_by_name(&self, name: &str) -> Result<Option<StoredApi>> {
        let row = sqlx::query(
            "SELECT id, name, description, category, timestamp FROM apis WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(row.as_ref().map(row_to_stored_api))
    }

    /// Get all entries
    pub async fn get_all(&self) -> Result<Vec<StoredApi>> {
        let rows = sqlx::query(
            "SELECT id, name, description, category, timestamp FROM apis ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(rows.iter().map(row_to_stored_api).collect())
    }

    /// Number of stored entries
    pub async fn count(&self) -> Result<u64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM apis")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(row.0 as u64)
    }
}

fn row_to_stored_api(row: &sqlx::sqlite::SqliteRow) -> StoredApi {
    StoredApi {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        category: row.get("category"),
        timestamp: row.get("timestamp"),
    }
}
