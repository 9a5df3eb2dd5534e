// file: src/database/proposals.rs
use anyhow::Result;
use sqlx::SqlitePool;

use super::page::{like_pattern, Page, PageRequest};
use crate::models::proposal::ProposalRow;
use crate::models::{Proposal, ProposalFilter};

const SELECT_PROPOSALS: &str = r#"
    SELECT
        id, company_id, client_name, client_email, title, status, sites, notes,
        valid_until, created_by, created_at, updated_at
    FROM proposals
"#;

// Unset criteria bind NULL and short-circuit their clause. Text matches
// `search_text`, folded in Rust like the pattern; SQLite's LOWER() only
// folds ASCII.
const FILTER_CLAUSE: &str = r#"
    WHERE company_id = ?
        AND (? IS NULL OR search_text LIKE ? ESCAPE '\')
        AND (? IS NULL OR status = ?)
        AND (? IS NULL OR created_by = ?)
"#;

fn search_text(proposal: &Proposal) -> String {
    format!("{}\n{}", proposal.client_name, proposal.title).to_lowercase()
}

pub async fn insert(pool: &SqlitePool, proposal: &Proposal) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO proposals (
            id, company_id, client_name, client_email, title, status, sites, notes,
            valid_until, created_by, created_at, updated_at, search_text
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&proposal.id)
    .bind(&proposal.company_id)
    .bind(&proposal.client_name)
    .bind(&proposal.client_email)
    .bind(&proposal.title)
    .bind(proposal.status.as_str())
    .bind(serde_json::to_string(&proposal.sites)?)
    .bind(&proposal.notes)
    .bind(proposal.valid_until)
    .bind(&proposal.created_by)
    .bind(proposal.created_at)
    .bind(proposal.updated_at)
    .bind(search_text(proposal))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get(pool: &SqlitePool, proposal_id: &str) -> Result<Option<Proposal>> {
    let sql = format!("{} WHERE id = ?", SELECT_PROPOSALS);
    let row = sqlx::query_as::<_, ProposalRow>(&sql)
        .bind(proposal_id)
        .fetch_optional(pool)
        .await?;

    row.map(Proposal::try_from).transpose()
}

pub async fn update(pool: &SqlitePool, proposal: &Proposal) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE proposals SET
            client_name = ?, client_email = ?, title = ?, status = ?, sites = ?, notes = ?,
            valid_until = ?, updated_at = ?, search_text = ?
        WHERE id = ?
        "#,
    )
    .bind(&proposal.client_name)
    .bind(&proposal.client_email)
    .bind(&proposal.title)
    .bind(proposal.status.as_str())
    .bind(serde_json::to_string(&proposal.sites)?)
    .bind(&proposal.notes)
    .bind(proposal.valid_until)
    .bind(proposal.updated_at)
    .bind(search_text(proposal))
    .bind(&proposal.id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &SqlitePool, proposal_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM proposals WHERE id = ?")
        .bind(proposal_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Filtered, newest-first page of a company's proposals.
pub async fn search(
    pool: &SqlitePool,
    company_id: &str,
    filter: &ProposalFilter,
    page: PageRequest,
) -> Result<Page<Proposal>> {
    let text = filter
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());
    let pattern = text.map(like_pattern);
    let status = filter.status.map(|s| s.as_str());
    let created_by = filter.created_by.as_deref();

    let count_sql = format!("SELECT COUNT(*) FROM proposals {}", FILTER_CLAUSE);
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(company_id)
        .bind(text)
        .bind(&pattern)
        .bind(status)
        .bind(status)
        .bind(created_by)
        .bind(created_by)
        .fetch_one(pool)
        .await?;

    let page_sql = format!(
        "{} {} ORDER BY created_at DESC, id ASC LIMIT ? OFFSET ?",
        SELECT_PROPOSALS, FILTER_CLAUSE
    );
    let rows = sqlx::query_as::<_, ProposalRow>(&page_sql)
        .bind(company_id)
        .bind(text)
        .bind(&pattern)
        .bind(status)
        .bind(status)
        .bind(created_by)
        .bind(created_by)
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(pool)
        .await?;

    let items = rows
        .into_iter()
        .map(Proposal::try_from)
        .collect::<Result<Vec<_>>>()?;

    Ok(Page {
        items,
        total,
        offset: page.offset,
        limit: page.limit,
    })
}
