//! Timeouts and retry policy for the outbound HTTP integrations.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

use crate::utils::retry::RetryConfig;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    /// Total request timeout
    pub timeout: Duration,
    pub max_retries: u32,
    pub base_retry_delay: Duration,
    pub max_retry_delay: Duration,
    pub backoff_multiplier: f64,
    pub user_agent: &'static str,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(45),
            max_retries: 3,
            base_retry_delay: Duration::from_millis(500),
            max_retry_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            user_agent: concat!("oohplanner/", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    /// Transactional email. Fails fast so a send button does not hang.
    pub fn email() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            timeout: Duration::from_secs(20),
            max_retries: 3,
            base_retry_delay: Duration::from_millis(750),
            max_retry_delay: Duration::from_secs(8),
            ..Self::default()
        }
    }

    /// Forecast lookups, read-only and safe to retry.
    pub fn weather() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            base_retry_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(10),
            backoff_multiplier: 1.5,
            ..Self::default()
        }
    }

    pub fn build_client(&self) -> reqwest::Result<Client> {
        ClientBuilder::new()
            .connect_timeout(self.connect_timeout)
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(2)
            .build()
    }

    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_retries,
            base_delay: self.base_retry_delay,
            max_delay: self.max_retry_delay,
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}
