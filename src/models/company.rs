// file: src/models/company.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn new(name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            address: None,
            phone: None,
            email: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Viewer,
    Sales,
    Logistics,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Sales => "sales",
            Role::Logistics => "logistics",
            Role::Admin => "admin",
        }
    }

    /// Admins hold every role; everyone holds `Viewer`.
    pub fn grants(&self, required: Role) -> bool {
        *self == Role::Admin || *self == required || required == Role::Viewer
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub company_id: String,
    pub email: String,
    pub display_name: String,
    pub role: String,
    pub last_active_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(company_id: &str, email: &str, display_name: &str, role: Role) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            role: role.as_str().to_string(),
            last_active_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn role(&self) -> Result<Role, String> {
        match self.role.as_str() {
            "viewer" => Ok(Role::Viewer),
            "sales" => Ok(Role::Sales),
            "logistics" => Ok(Role::Logistics),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", self.role)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: String,
    pub company_id: String,
    pub plan: String,
    pub status: String, // active | trialing | past_due | cancelled
    pub max_users: i64,
    pub starts_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn new(company_id: &str, plan: &str, max_users: i64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            plan: plan.to_string(),
            status: "active".to_string(),
            max_users,
            starts_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        let status_ok = matches!(self.status.as_str(), "active" | "trialing");
        let not_expired = self.expires_at.map(|exp| exp > now).unwrap_or(true);
        status_ok && not_expired && self.starts_at <= now
    }
}
