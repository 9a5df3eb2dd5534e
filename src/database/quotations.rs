// file: src/database/quotations.rs
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::quotation::QuotationRow;
use crate::models::{NewQuotation, Quotation};

const SELECT_QUOTATIONS: &str = r#"
    SELECT
        id, company_id, proposal_id, kind, number, client_name, client_email, items,
        tax_rate, discount, status, notes, valid_until, created_by, created_at, updated_at
    FROM quotations
"#;

/// Store a new quotation, assigning the next `PREFIX-YYYYMM-NNNN` number for
/// the company, one past the highest issued this month. Numbering and insert share one transaction; the unique
/// `(company_id, number)` index rejects a concurrent duplicate.
pub async fn insert(
    pool: &SqlitePool,
    company_id: &str,
    created_by: &str,
    new: &NewQuotation,
) -> Result<Quotation> {
    let now = Utc::now();
    let period = format!("{}-{}", new.kind.number_prefix(), now.format("%Y%m"));

    let mut tx = pool.begin().await?;

    // Highest sequence rather than a row count, so gaps left by deletes never collide.
    let last: i64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(MAX(CAST(substr(number, ?) AS INTEGER)), 0)
        FROM quotations
        WHERE company_id = ? AND number LIKE ?
        "#,
    )
    .bind(period.len() as i64 + 2)
    .bind(company_id)
    .bind(format!("{}-%", period))
    .fetch_one(&mut *tx)
    .await?;

    let quotation = Quotation {
        id: uuid::Uuid::new_v4().to_string(),
        company_id: company_id.to_string(),
        proposal_id: new.proposal_id.clone(),
        kind: new.kind,
        number: format!("{}-{:04}", period, last + 1),
        client_name: new.client_name.clone(),
        client_email: new.client_email.clone(),
        items: new.items.clone(),
        tax_rate: new.tax_rate,
        discount: new.discount,
        status: "draft".to_string(),
        notes: new.notes.clone(),
        valid_until: new.valid_until,
        created_by: created_by.to_string(),
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO quotations (
            id, company_id, proposal_id, kind, number, client_name, client_email, items,
            tax_rate, discount, status, notes, valid_until, created_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&quotation.id)
    .bind(&quotation.company_id)
    .bind(&quotation.proposal_id)
    .bind(quotation.kind.as_str())
    .bind(&quotation.number)
    .bind(&quotation.client_name)
    .bind(&quotation.client_email)
    .bind(serde_json::to_string(&quotation.items)?)
    .bind(quotation.tax_rate)
    .bind(quotation.discount)
    .bind(&quotation.status)
    .bind(&quotation.notes)
    .bind(quotation.valid_until)
    .bind(&quotation.created_by)
    .bind(quotation.created_at)
    .bind(quotation.updated_at)
    .execute(&mut *tx)
    .await
    .context("Failed to insert quotation")?;

    tx.commit().await?;

    Ok(quotation)
}

pub async fn get(pool: &SqlitePool, quotation_id: &str) -> Result<Option<Quotation>> {
    let sql = format!("{} WHERE id = ?", SELECT_QUOTATIONS);
    let row = sqlx::query_as::<_, QuotationRow>(&sql)
        .bind(quotation_id)
        .fetch_optional(pool)
        .await?;

    row.map(Quotation::try_from).transpose()
}

/// The number and kind are fixed at creation and not updated.
pub async fn update(pool: &SqlitePool, quotation: &Quotation) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE quotations SET
            proposal_id = ?, client_name = ?, client_email = ?, items = ?, tax_rate = ?,
            discount = ?, status = ?, notes = ?, valid_until = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&quotation.proposal_id)
    .bind(&quotation.client_name)
    .bind(&quotation.client_email)
    .bind(serde_json::to_string(&quotation.items)?)
    .bind(quotation.tax_rate)
    .bind(quotation.discount)
    .bind(&quotation.status)
    .bind(&quotation.notes)
    .bind(quotation.valid_until)
    .bind(quotation.updated_at)
    .bind(&quotation.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &SqlitePool, quotation_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM quotations WHERE id = ?")
        .bind(quotation_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_for_proposal(pool: &SqlitePool, proposal_id: &str) -> Result<Vec<Quotation>> {
    let sql = format!("{} WHERE proposal_id = ? ORDER BY created_at ASC, number ASC", SELECT_QUOTATIONS);
    let rows = sqlx::query_as::<_, QuotationRow>(&sql)
        .bind(proposal_id)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(Quotation::try_from).collect()
}
