//! Periodic background jobs.

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, info};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::database::Database;
use crate::models::User;
use crate::subscription::{Subscription, SubscriptionHub};
use crate::utils::logging::log_error_with_context;

pub struct TaskHandle {
    name: String,
    token: CancellationToken,
    runs: Arc<AtomicU64>,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the loop at its next wait. A job already running is allowed to finish.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Completed job runs, successful or not.
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    pub async fn join(self) -> Result<()> {
        self.join
            .await
            .with_context(|| format!("Task '{}' panicked", self.name))
    }
}

pub struct PollingTask;

impl PollingTask {
    /// Run `job` now and then every `period` until `token` (or the returned
    /// handle) is cancelled. Job errors are logged and the loop carries on.
    pub fn spawn<F, Fut>(name: &str, period: Duration, token: CancellationToken, mut job: F) -> TaskHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let token = token.child_token();
        let runs = Arc::new(AtomicU64::new(0));

        let task_name = name.to_string();
        let task_token = token.clone();
        let task_runs = runs.clone();

        let join = tokio::spawn(async move {
            info!("Starting {} loop (every {:?})", task_name, period);

            loop {
                if task_token.is_cancelled() {
                    break;
                }

                match job().await {
                    Ok(()) => debug!("{} cycle completed", task_name),
                    Err(e) => log_error_with_context(&e, &task_name),
                }
                task_runs.fetch_add(1, Ordering::SeqCst);

                tokio::select! {
                    _ = sleep(period) => {}
                    _ = task_token.cancelled() => break,
                }
            }

            info!("{} loop stopped gracefully", task_name);
        });

        TaskHandle {
            name: name.to_string(),
            token,
            runs,
            join,
        }
    }
}

/// Publishes the users of one company seen within a trailing window.
pub struct ActiveUsersMonitor {
    db: Arc<Database>,
    hub: Arc<SubscriptionHub<String, Vec<User>>>,
    company_id: String,
    window: chrono::Duration,
}

impl ActiveUsersMonitor {
    pub fn new(
        db: Arc<Database>,
        hub: Arc<SubscriptionHub<String, Vec<User>>>,
        company_id: &str,
        window_minutes: i64,
    ) -> Self {
        Self {
            db,
            hub,
            company_id: company_id.to_string(),
            window: chrono::Duration::minutes(window_minutes.max(1)),
        }
    }

    pub async fn subscribe(&self) -> Subscription<Vec<User>> {
        self.hub.subscribe(&self.company_id).await
    }

    pub async fn poll_once(&self) -> Result<usize> {
        let since = Utc::now() - self.window;
        let users = self.db.get_active_users(&self.company_id, since).await?;
        let count = users.len();
        self.hub.publish(&self.company_id, users).await;
        Ok(count)
    }

    pub fn spawn(self: Arc<Self>, period: Duration, token: CancellationToken) -> TaskHandle {
        PollingTask::spawn("active-users", period, token, move || {
            let monitor = self.clone();
            async move {
                let count = monitor.poll_once().await?;
                debug!("{} active user(s) in company {}", count, monitor.company_id);
                Ok(())
            }
        })
    }
}
