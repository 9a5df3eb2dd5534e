// file: src/database/companies.rs
use anyhow::Result;
use sqlx::SqlitePool;

use crate::models::{Company, Subscription};

pub async fn insert(pool: &SqlitePool, company: &Company) -> Result<()> {
    sqlx::query(
        "INSERT INTO companies (id, name, address, phone, email, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&company.id)
    .bind(&company.name)
    .bind(&company.address)
    .bind(&company.phone)
    .bind(&company.email)
    .bind(company.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get(pool: &SqlitePool, company_id: &str) -> Result<Option<Company>> {
    let company = sqlx::query_as::<_, Company>(
        "SELECT id, name, address, phone, email, created_at FROM companies WHERE id = ?",
    )
    .bind(company_id)
    .fetch_optional(pool)
    .await?;

    Ok(company)
}

pub async fn update(pool: &SqlitePool, company: &Company) -> Result<bool> {
    let result = sqlx::query("UPDATE companies SET name = ?, address = ?, phone = ?, email = ? WHERE id = ?")
        .bind(&company.name)
        .bind(&company.address)
        .bind(&company.phone)
        .bind(&company.email)
        .bind(&company.id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Insert or replace by subscription id.
pub async fn save_subscription(pool: &SqlitePool, subscription: &Subscription) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO subscriptions (id, company_id, plan, status, max_users, starts_at, expires_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            plan = excluded.plan,
            status = excluded.status,
            max_users = excluded.max_users,
            starts_at = excluded.starts_at,
            expires_at = excluded.expires_at
        "#,
    )
    .bind(&subscription.id)
    .bind(&subscription.company_id)
    .bind(&subscription.plan)
    .bind(&subscription.status)
    .bind(subscription.max_users)
    .bind(subscription.starts_at)
    .bind(subscription.expires_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// The most recently started subscription of a company.
pub async fn current_subscription(pool: &SqlitePool, company_id: &str) -> Result<Option<Subscription>> {
    let subscription = sqlx::query_as::<_, Subscription>(
        r#"
        SELECT id, company_id, plan, status, max_users, starts_at, expires_at
        FROM subscriptions
        WHERE company_id = ?
        ORDER BY starts_at DESC
        LIMIT 1
        "#,
    )
    .bind(company_id)
    .fetch_optional(pool)
    .await?;

    Ok(subscription)
}
