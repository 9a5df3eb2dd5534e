// file: src/database/events.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::event::EventRow;
use crate::models::CalendarEvent;

const SELECT_EVENTS: &str = r#"
    SELECT
        id, company_id, title, description, location, start_time, end_time, all_day,
        recurrence_type, recurrence_interval, recurrence_end_date, recurrence_count,
        created_by, client_id, status, event_type, created_at, updated_at
    FROM events
"#;

fn into_events(rows: Vec<EventRow>) -> Result<Vec<CalendarEvent>> {
    rows.into_iter().map(CalendarEvent::try_from).collect()
}

pub async fn insert(pool: &SqlitePool, event: &CalendarEvent) -> Result<()> {
    let rule = event.recurrence.as_ref();

    sqlx::query(
        r#"
        INSERT INTO events (
            id, company_id, title, description, location, start_time, end_time, all_day,
            recurrence_type, recurrence_interval, recurrence_end_date, recurrence_count,
            created_by, client_id, status, event_type, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&event.id)
    .bind(&event.company_id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.location)
    .bind(event.start)
    .bind(event.end)
    .bind(event.all_day)
    .bind(rule.map(|r| r.kind.as_str().to_string()))
    .bind(rule.map(|r| i64::from(r.interval)))
    .bind(rule.and_then(|r| r.end_date))
    .bind(rule.and_then(|r| r.count).map(i64::from))
    .bind(&event.created_by)
    .bind(&event.client_id)
    .bind(event.status.as_str())
    .bind(event.event_type.as_str())
    .bind(event.created_at)
    .bind(event.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get(pool: &SqlitePool, event_id: &str) -> Result<Option<CalendarEvent>> {
    let sql = format!("{} WHERE id = ?", SELECT_EVENTS);
    let row = sqlx::query_as::<_, EventRow>(&sql)
        .bind(event_id)
        .fetch_optional(pool)
        .await?;

    row.map(CalendarEvent::try_from).transpose()
}

/// Overwrites every mutable column. Returns false when no row matched.
pub async fn update(pool: &SqlitePool, event: &CalendarEvent) -> Result<bool> {
    let rule = event.recurrence.as_ref();

    let result = sqlx::query(
        r#"
        UPDATE events SET
            title = ?, description = ?, location = ?, start_time = ?, end_time = ?, all_day = ?,
            recurrence_type = ?, recurrence_interval = ?, recurrence_end_date = ?, recurrence_count = ?,
            client_id = ?, status = ?, event_type = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.location)
    .bind(event.start)
    .bind(event.end)
    .bind(event.all_day)
    .bind(rule.map(|r| r.kind.as_str().to_string()))
    .bind(rule.map(|r| i64::from(r.interval)))
    .bind(rule.and_then(|r| r.end_date))
    .bind(rule.and_then(|r| r.count).map(i64::from))
    .bind(&event.client_id)
    .bind(event.status.as_str())
    .bind(event.event_type.as_str())
    .bind(event.updated_at)
    .bind(&event.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &SqlitePool, event_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(event_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// All templates owned by `owner_id`, earliest first.
pub async fn list_by_owner(pool: &SqlitePool, owner_id: &str) -> Result<Vec<CalendarEvent>> {
    let sql = format!("{} WHERE created_by = ? ORDER BY start_time ASC, id ASC", SELECT_EVENTS);
    let rows = sqlx::query_as::<_, EventRow>(&sql)
        .bind(owner_id)
        .fetch_all(pool)
        .await?;

    into_events(rows)
}

/// Templates that can contribute an occurrence to the window: anything
/// starting by `window_end`, and for one-off events only those still running
/// at `window_start`.
pub async fn list_candidates(
    pool: &SqlitePool,
    owner_id: &str,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Result<Vec<CalendarEvent>> {
    let sql = format!(
        r#"{}
        WHERE created_by = ?
            AND start_time <= ?
            AND (
                (recurrence_type IS NOT NULL AND recurrence_type != 'none')
                OR end_time >= ?
            )
        ORDER BY start_time ASC, id ASC
        "#,
        SELECT_EVENTS
    );
    let rows = sqlx::query_as::<_, EventRow>(&sql)
        .bind(owner_id)
        .bind(window_end)
        .bind(window_start)
        .fetch_all(pool)
        .await?;

    into_events(rows)
}
