//! Explicit per-request context handed to the services.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::database::Database;
use crate::error::{AppError, AppResult};
use crate::models::{CalendarEvent, Company, Role, Subscription, User};
use crate::subscription::SubscriptionHub;

/// Live template snapshots, keyed by owner id.
pub type EventFeed = SubscriptionHub<String, Vec<CalendarEvent>>;

/// The signed-in user and the tenant they act for.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub company: Company,
    pub subscription: Option<Subscription>,
}

impl Session {
    pub async fn load(db: &Database, user_id: &str) -> AppResult<Self> {
        let user = db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("user {}", user_id)))?;
        let company = db
            .get_company(&user.company_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("company {}", user.company_id)))?;
        let subscription = db.get_subscription(&company.id).await?;

        Ok(Self {
            user,
            company,
            subscription,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    pub fn company_id(&self) -> &str {
        &self.company.id
    }

    pub fn require_role(&self, required: Role) -> AppResult<()> {
        let role = self.user.role().map_err(AppError::permission_denied)?;
        if role.grants(required) {
            Ok(())
        } else {
            Err(AppError::permission_denied(format!(
                "{} role required, user has {}",
                required.as_str(),
                role.as_str()
            )))
        }
    }

    pub fn ensure_subscription_active(&self, now: DateTime<Utc>) -> AppResult<()> {
        match &self.subscription {
            Some(sub) if sub.is_active_at(now) => Ok(()),
            Some(sub) => Err(AppError::subscription_inactive(format!(
                "{} plan is {}",
                sub.plan, sub.status
            ))),
            None => Err(AppError::subscription_inactive("no subscription on file")),
        }
    }

    /// Tenant check for records loaded by id.
    pub fn ensure_same_company(&self, company_id: &str) -> AppResult<()> {
        if company_id == self.company.id {
            Ok(())
        } else {
            Err(AppError::permission_denied("record belongs to another company"))
        }
    }
}

#[derive(Clone)]
pub struct AppContext {
    pub db: Arc<Database>,
    pub session: Arc<Session>,
    pub config: Arc<AppConfig>,
    pub events: Arc<EventFeed>,
    pub shutdown: CancellationToken,
}

impl AppContext {
    pub fn new(db: Arc<Database>, session: Session, config: Arc<AppConfig>) -> Self {
        Self {
            db,
            session: Arc::new(session),
            config,
            events: Arc::new(EventFeed::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Same storage, feeds and shutdown token, acting as another user.
    pub fn with_session(&self, session: Session) -> Self {
        Self {
            session: Arc::new(session),
            ..self.clone()
        }
    }
}
