// file: src/database/notifications.rs
use anyhow::Result;
use sqlx::SqlitePool;

use crate::models::Notification;

pub async fn insert(pool: &SqlitePool, notification: &Notification) -> Result<()> {
    sqlx::query(
        "INSERT INTO notifications (id, company_id, user_id, title, message, kind, read, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&notification.id)
    .bind(&notification.company_id)
    .bind(&notification.user_id)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.kind)
    .bind(notification.read)
    .bind(notification.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Newest first.
pub async fn list_for_user(pool: &SqlitePool, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
    let notifications = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, company_id, user_id, title, message, kind, read, created_at
        FROM notifications
        WHERE user_id = ?
            AND (? = 0 OR read = 0)
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(unread_only)
    .fetch_all(pool)
    .await?;

    Ok(notifications)
}

pub async fn mark_read(pool: &SqlitePool, notification_id: &str) -> Result<bool> {
    let result = sqlx::query("UPDATE notifications SET read = 1 WHERE id = ?")
        .bind(notification_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn mark_all_read(pool: &SqlitePool, user_id: &str) -> Result<u64> {
    let result = sqlx::query("UPDATE notifications SET read = 1 WHERE user_id = ? AND read = 0")
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn delete(pool: &SqlitePool, notification_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = ?")
        .bind(notification_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn unread_count(pool: &SqlitePool, user_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND read = 0")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}
