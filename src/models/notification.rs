// file: src/models/notification.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: String,
    pub company_id: String,
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub kind: String, // info | warning | proposal | quotation | planner
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(company_id: &str, user_id: &str, kind: &str, title: &str, message: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            user_id: user_id.to_string(),
            title: title.to_string(),
            message: message.to_string(),
            kind: kind.to_string(),
            read: false,
            created_at: Utc::now(),
        }
    }
}
