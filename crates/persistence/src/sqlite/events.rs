//! Event catalog persistence operations

use chrono::{DateTime, Utc};
use prizebox_core::{Error, Event, Result};
use sqlx::SqlitePool;

/// Event row stored in database
#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: i64,
    title: String,
    description: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    is_active: i32,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            title: row.title,
            description: row.description,
            start_time: row.start_time,
            end_time: row.end_time,
            is_active: row.is_active != 0,
        }
    }
}

/// Create a new event
pub async fn insert_event(
    pool: &SqlitePool,
    title: &str,
    description: &str,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    is_active: bool,
) -> Result<i64> {
    if start_time >= end_time {
        return Err(Error::InvalidData(
            "event window must start before it ends".to_string(),
        ));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO events (title, description, start_time, end_time, is_active)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(title)
    .bind(description)
    .bind(start_time)
    .bind(end_time)
    .bind(is_active)
    .execute(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(result.last_insert_rowid())
}

/// Get a specific event by ID
pub async fn get_event(pool: &SqlitePool, id: i64) -> Result<Option<Event>> {
    let row: Option<EventRow> = sqlx::query_as(
        r#"
        SELECT id, title, description, start_time, end_time, is_active
        FROM events
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(row.map(Event::from))
}

/// List all events, newest window first
pub async fn list_events(pool: &SqlitePool) -> Result<Vec<Event>> {
    let rows: Vec<EventRow> = sqlx::query_as(
        r#"
        SELECT id, title, description, start_time, end_time, is_active
        FROM events
        ORDER BY start_time DESC
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(Event::from).collect())
}

/// List events whose toggle is on and whose window contains `now`
pub async fn list_active_events(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<Event>> {
    let rows: Vec<EventRow> = sqlx::query_as(
        r#"
        SELECT id, title, description, start_time, end_time, is_active
        FROM events
        WHERE is_active = 1 AND start_time <= ? AND end_time >= ?
        ORDER BY end_time ASC
        "#,
    )
    .bind(now)
    .bind(now)
    .fetch_all(pool)
    .await
    .map_err(|e| Error::DatabaseError(e.to_string()))?;

    Ok(rows.into_iter().map(Event::from).collect())
}

/// Flip the operator toggle on an event
pub async fn set_event_active(pool: &SqlitePool, id: i64, active: bool) -> Result<()> {
    let result = sqlx::query("UPDATE events SET is_active = ? WHERE id = ?")
        .bind(active)
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err(Error::EventNotFound(id));
    }
    Ok(())
}
