// file: src/database/mod.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePool, Sqlite};
use std::path::Path;

use crate::models::{
    CalendarEvent, Company, NewQuotation, Notification, PlannerSettings, Proposal, ProposalFilter,
    Quotation, Subscription, User,
};

// Declare submodules
pub mod companies;
pub mod events;
pub mod notifications;
pub mod page;
pub mod proposals;
pub mod quotations;
pub mod settings;
pub mod users;

pub use page::{Page, PageRequest};

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `url` and bring its schema
    /// up to date.
    pub async fn connect(url: &str) -> Result<Self> {
        ensure_parent_dir(url)?;

        let db_exists = Sqlite::database_exists(url)
            .await
            .context("Failed to check if database exists")?;
        if !db_exists {
            info!("Creating database");
            Sqlite::create_database(url)
                .await
                .context("Failed to create database")?;
        }

        let pool = SqlitePool::connect(url)
            .await
            .context("Failed to connect to database")?;

        Self::from_pool(pool).await
    }

    /// Wrap an existing pool, creating any missing tables on it.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        run_schema(&pool).await.context("Failed to run database schema")?;

        info!("Database initialized successfully");
        Ok(Database { pool })
    }

    // --- Event Delegates ---

    pub async fn insert_event(&self, event: &CalendarEvent) -> Result<()> {
        events::insert(&self.pool, event).await
    }

    pub async fn get_event(&self, event_id: &str) -> Result<Option<CalendarEvent>> {
        events::get(&self.pool, event_id).await
    }

    pub async fn update_event(&self, event: &CalendarEvent) -> Result<bool> {
        events::update(&self.pool, event).await
    }

    pub async fn delete_event(&self, event_id: &str) -> Result<bool> {
        events::delete(&self.pool, event_id).await
    }

    pub async fn get_events_by_owner(&self, owner_id: &str) -> Result<Vec<CalendarEvent>> {
        events::list_by_owner(&self.pool, owner_id).await
    }

    pub async fn get_event_candidates(
        &self,
        owner_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        events::list_candidates(&self.pool, owner_id, window_start, window_end).await
    }

    // --- Company / Subscription Delegates ---

    pub async fn add_company(&self, company: &Company) -> Result<()> {
        companies::insert(&self.pool, company).await
    }

    pub async fn get_company(&self, company_id: &str) -> Result<Option<Company>> {
        companies::get(&self.pool, company_id).await
    }

    pub async fn update_company(&self, company: &Company) -> Result<bool> {
        companies::update(&self.pool, company).await
    }

    pub async fn save_subscription(&self, subscription: &Subscription) -> Result<()> {
        companies::save_subscription(&self.pool, subscription).await
    }

    pub async fn get_subscription(&self, company_id: &str) -> Result<Option<Subscription>> {
        companies::current_subscription(&self.pool, company_id).await
    }

    // --- User Delegates ---

    pub async fn add_user(&self, user: &User) -> Result<()> {
        users::insert(&self.pool, user).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        users::get(&self.pool, user_id).await
    }

    pub async fn get_company_users(&self, company_id: &str) -> Result<Vec<User>> {
        users::list_by_company(&self.pool, company_id).await
    }

    pub async fn touch_user(&self, user_id: &str) -> Result<()> {
        users::touch(&self.pool, user_id).await
    }

    pub async fn get_active_users(&self, company_id: &str, since: DateTime<Utc>) -> Result<Vec<User>> {
        users::active_since(&self.pool, company_id, since).await
    }

    // --- Proposal Delegates ---

    pub async fn add_proposal(&self, proposal: &Proposal) -> Result<()> {
        proposals::insert(&self.pool, proposal).await
    }

    pub async fn get_proposal(&self, proposal_id: &str) -> Result<Option<Proposal>> {
        proposals::get(&self.pool, proposal_id).await
    }

    pub async fn update_proposal(&self, proposal: &Proposal) -> Result<bool> {
        proposals::update(&self.pool, proposal).await
    }

    pub async fn delete_proposal(&self, proposal_id: &str) -> Result<bool> {
        proposals::delete(&self.pool, proposal_id).await
    }

    pub async fn search_proposals(
        &self,
        company_id: &str,
        filter: &ProposalFilter,
        page: PageRequest,
    ) -> Result<Page<Proposal>> {
        proposals::search(&self.pool, company_id, filter, page).await
    }

    // --- Quotation Delegates ---

    pub async fn add_quotation(
        &self,
        company_id: &str,
        created_by: &str,
        new: &NewQuotation,
    ) -> Result<Quotation> {
        quotations::insert(&self.pool, company_id, created_by, new).await
    }

    pub async fn get_quotation(&self, quotation_id: &str) -> Result<Option<Quotation>> {
        quotations::get(&self.pool, quotation_id).await
    }

    pub async fn update_quotation(&self, quotation: &Quotation) -> Result<bool> {
        quotations::update(&self.pool, quotation).await
    }

    pub async fn delete_quotation(&self, quotation_id: &str) -> Result<bool> {
        quotations::delete(&self.pool, quotation_id).await
    }

    pub async fn get_proposal_quotations(&self, proposal_id: &str) -> Result<Vec<Quotation>> {
        quotations::list_for_proposal(&self.pool, proposal_id).await
    }

    // --- Notification Delegates ---

    pub async fn add_notification(&self, notification: &Notification) -> Result<()> {
        notifications::insert(&self.pool, notification).await
    }

    pub async fn get_notifications(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>> {
        notifications::list_for_user(&self.pool, user_id, unread_only).await
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<bool> {
        notifications::mark_read(&self.pool, notification_id).await
    }

    pub async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64> {
        notifications::mark_all_read(&self.pool, user_id).await
    }

    pub async fn delete_notification(&self, notification_id: &str) -> Result<bool> {
        notifications::delete(&self.pool, notification_id).await
    }

    pub async fn unread_notification_count(&self, user_id: &str) -> Result<i64> {
        notifications::unread_count(&self.pool, user_id).await
    }

    // --- Settings Delegates ---

    pub async fn get_planner_settings(&self, company_id: &str) -> Result<PlannerSettings> {
        settings::get(&self.pool, company_id).await
    }

    pub async fn update_planner_settings(&self, company_id: &str, settings: &PlannerSettings) -> Result<()> {
        settings::update(&self.pool, company_id, settings).await
    }
}

/// SQLite will not create missing directories for a file database.
fn ensure_parent_dir(url: &str) -> Result<()> {
    let Some(rest) = url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let path = rest.trim_start_matches("//");
    let path = path.split('?').next().unwrap_or("");
    if path.is_empty() || path.contains(":memory:") {
        return Ok(());
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data directory {}", parent.display()))?;
        }
    }
    Ok(())
}

async fn run_schema(pool: &SqlitePool) -> Result<()> {
    let schema = include_str!("schema.sql");

    let mut current_statement = String::new();

    for line in schema.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") || trimmed.is_empty() {
            continue;
        }

        current_statement.push_str(line);
        current_statement.push('\n');

        if trimmed.ends_with(';') {
            sqlx::query(&current_statement).execute(pool).await?;
            current_statement.clear();
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    pub(crate) async fn create_test_database() -> Database {
        let temp_file = NamedTempFile::new().unwrap();
        let (_, path) = temp_file.keep().unwrap();
        let db_path = format!("sqlite:{}", path.to_str().unwrap());

        Database::connect(&db_path).await.unwrap()
    }

    #[tokio::test]
    async fn test_database_connect() {
        let db = create_test_database().await;
        assert!(!db.pool.is_closed());
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let db = create_test_database().await;
        run_schema(&db.pool).await.unwrap();
    }

    #[tokio::test]
    async fn test_from_pool_creates_every_table() {
        // One connection: every in-memory connection is its own database.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = Database::from_pool(pool).await.unwrap();

        let tables: Vec<String> =
            sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .fetch_all(&db.pool)
                .await
                .unwrap();
        for table in [
            "companies",
            "events",
            "notifications",
            "proposals",
            "quotations",
            "settings",
            "subscriptions",
            "users",
        ] {
            assert!(tables.iter().any(|t| t == table), "missing table {}", table);
        }
    }

    #[tokio::test]
    async fn test_reopen_keeps_data() {
        let temp_file = NamedTempFile::new().unwrap();
        let (_, path) = temp_file.keep().unwrap();
        let url = format!("sqlite:{}", path.to_str().unwrap());

        let company = Company::new("Skyline Outdoor");
        let first = Database::connect(&url).await.unwrap();
        first.add_company(&company).await.unwrap();
        first.pool.close().await;

        let reopened = Database::connect(&url).await.unwrap();
        let loaded = reopened.get_company(&company.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Skyline Outdoor");
    }

    #[tokio::test]
    async fn test_connect_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("planner.db");
        let url = format!("sqlite:{}?mode=rwc", path.display());

        let db = Database::connect(&url).await.unwrap();
        assert!(!db.pool.is_closed());
        assert!(path.exists());
    }

    #[test]
    fn test_ensure_parent_dir_ignores_memory() {
        assert!(ensure_parent_dir("sqlite::memory:").is_ok());
        assert!(ensure_parent_dir("postgres://localhost/db").is_ok());
    }
}
