//! Restart event history

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use vigil_core::{Error, RestartEvent, RestartOutcome, Result};

/// Repository for restart events
pub struct EventsRepository {
    pool: SqlitePool,
}

impl EventsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an event
    pub async fn record(&self, event: &RestartEvent) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO restart_events (service, outcome, detail, timestamp) VALUES (?, ?, ?, ?)",
        )
        .bind(&event.service)
        .bind(event.outcome.as_str())
        .bind(&event.detail)
        .bind(event.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent events first
    pub async fn recent(&self, limit: u32) -> Result<Vec<RestartEvent>> {
        let rows = sqlx::query(
            "SELECT service, outcome, detail, timestamp FROM restart_events ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        rows.iter().map(row_to_event).collect()
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> Result<RestartEvent> {
    let outcome: String = row.get("outcome");
    let timestamp: String = row.get("timestamp");

    let outcome: RestartOutcome = outcome.parse()?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::DbError(format!("bad event timestamp '{}': {}", timestamp, e)))?;

    Ok(RestartEvent {
        service: row.get("service"),
        timestamp,
        outcome,
        detail: row.get("detail"),
    })
}
