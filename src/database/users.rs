// file: src/database/users.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::User;

pub async fn insert(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        "INSERT INTO users (id, company_id, email, display_name, role, last_active_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&user.id)
    .bind(&user.company_id)
    .bind(&user.email)
    .bind(&user.display_name)
    .bind(&user.role)
    .bind(user.last_active_at)
    .bind(user.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get(pool: &SqlitePool, user_id: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, company_id, email, display_name, role, last_active_at, created_at FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn list_by_company(pool: &SqlitePool, company_id: &str) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, company_id, email, display_name, role, last_active_at, created_at FROM users WHERE company_id = ? ORDER BY display_name ASC",
    )
    .bind(company_id)
    .fetch_all(pool)
    .await?;

    Ok(users)
}

/// Record activity for the user now.
pub async fn touch(pool: &SqlitePool, user_id: &str) -> Result<()> {
    let now = Utc::now();
    sqlx::query("UPDATE users SET last_active_at = ? WHERE id = ?")
        .bind(now)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Users of a company active at or after `since`, most recent first.
pub async fn active_since(pool: &SqlitePool, company_id: &str, since: DateTime<Utc>) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT id, company_id, email, display_name, role, last_active_at, created_at
        FROM users
        WHERE company_id = ?
            AND last_active_at IS NOT NULL
            AND last_active_at >= ?
        ORDER BY last_active_at DESC
        "#,
    )
    .bind(company_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    Ok(users)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::create_test_database;
    use crate::models::Role;
    use chrono::Duration;

    #[tokio::test]
    async fn test_touch_marks_user_active() {
        let db = create_test_database().await;
        let user = User::new("co-1", "rhea@example.com", "Rhea", Role::Sales);
        insert(&db.pool, &user).await.unwrap();

        let since = Utc::now() - Duration::minutes(5);
        assert!(active_since(&db.pool, "co-1", since).await.unwrap().is_empty());

        touch(&db.pool, &user.id).await.unwrap();
        let active = active_since(&db.pool, "co-1", since).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].email, "rhea@example.com");
    }

    #[tokio::test]
    async fn test_stale_and_foreign_users_excluded() {
        let db = create_test_database().await;
        let mut stale = User::new("co-1", "old@example.com", "Old", Role::Viewer);
        stale.last_active_at = Some(Utc::now() - Duration::hours(2));
        let mut foreign = User::new("co-2", "other@example.com", "Other", Role::Admin);
        foreign.last_active_at = Some(Utc::now());
        insert(&db.pool, &stale).await.unwrap();
        insert(&db.pool, &foreign).await.unwrap();

        let since = Utc::now() - Duration::minutes(5);
        assert!(active_since(&db.pool, "co-1", since).await.unwrap().is_empty());
        assert_eq!(list_by_company(&db.pool, "co-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = create_test_database().await;
        insert(&db.pool, &User::new("co-1", "dup@example.com", "A", Role::Sales))
            .await
            .unwrap();
        let result = insert(&db.pool, &User::new("co-1", "dup@example.com", "B", Role::Sales)).await;
        assert!(result.is_err());
    }
}
