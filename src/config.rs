//! Process configuration
//!
//! Values come from `OOH_*` environment variables. Anything not set falls
//! back to a default suitable for a single-machine deployment.

use crate::error::{AppError, AppResult};
use log::{info, warn};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";
const DEFAULT_WEATHER_API_URL: &str = "https://api.open-meteo.com/v1/forecast";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub email_api_url: String,
    pub email_api_key: Option<String>,
    pub email_from: String,
    pub weather_api_url: String,
    pub active_user_poll: Duration,
    pub active_user_window_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            email_api_url: DEFAULT_EMAIL_API_URL.to_string(),
            email_api_key: None,
            email_from: "no-reply@oohplanner.local".to_string(),
            weather_api_url: DEFAULT_WEATHER_API_URL.to_string(),
            active_user_poll: Duration::from_secs(30),
            active_user_window_minutes: 5,
        }
    }
}

impl AppConfig {
    /// Build the configuration from the process environment.
    ///
    /// Numeric variables that fail to parse are reported as
    /// [`AppError::Config`] rather than silently replaced.
    pub fn from_env() -> AppResult<Self> {
        let defaults = Self::default();

        let active_user_poll = match env::var("OOH_ACTIVE_USER_POLL_SECS") {
            Ok(raw) => Duration::from_secs(parse_number(&raw, "OOH_ACTIVE_USER_POLL_SECS")?),
            Err(_) => defaults.active_user_poll,
        };
        let active_user_window_minutes = match env::var("OOH_ACTIVE_USER_WINDOW_MINUTES") {
            Ok(raw) => parse_number(&raw, "OOH_ACTIVE_USER_WINDOW_MINUTES")?,
            Err(_) => defaults.active_user_window_minutes,
        };

        Ok(Self {
            database_url: env::var("OOH_DATABASE_URL").unwrap_or(defaults.database_url),
            email_api_url: env::var("OOH_EMAIL_API_URL").unwrap_or(defaults.email_api_url),
            email_api_key: env::var("OOH_EMAIL_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            email_from: env::var("OOH_EMAIL_FROM").unwrap_or(defaults.email_from),
            weather_api_url: env::var("OOH_WEATHER_API_URL").unwrap_or(defaults.weather_api_url),
            active_user_poll,
            active_user_window_minutes,
        })
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, name: &str) -> AppResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::config(format!("{} must be a number, got '{}'", name, raw)))
}

fn default_database_url() -> String {
    let dir = dirs::data_dir()
        .map(|d| d.join("oohplanner"))
        .unwrap_or_else(|| PathBuf::from("."));
    format!("sqlite:{}?mode=rwc", dir.join("oohplanner.db").display())
}

/// Validates the application configuration before any service starts.
pub fn validate_config(config: &AppConfig) -> AppResult<()> {
    info!("Validating configuration");

    validate_api_url(&config.email_api_url, "email API")?;
    validate_api_url(&config.weather_api_url, "weather API")?;

    if config.active_user_poll.is_zero() {
        return Err(AppError::config("active user poll interval must be greater than zero"));
    }
    if config.active_user_window_minutes <= 0 {
        return Err(AppError::config("active user window must be a positive number of minutes"));
    }
    if !crate::integrations::mailer::is_valid_address(&config.email_from) {
        return Err(AppError::config(format!(
            "sender address '{}' is not a valid email address",
            config.email_from
        )));
    }
    if config.email_api_key.is_none() {
        warn!("OOH_EMAIL_API_KEY is not set; email delivery will be rejected by the provider");
    }

    Ok(())
}

/// HTTPS is required unless the endpoint is on the loopback interface.
fn validate_api_url(raw: &str, label: &str) -> AppResult<()> {
    let parsed = Url::parse(raw)
        .map_err(|e| AppError::config(format!("Invalid {} URL '{}': {}", label, raw, e)))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| AppError::config(format!("{} URL '{}' has no host", label, raw)))?;
    let loopback = host == "localhost" || host.starts_with("127.") || host == "[::1]";

    match parsed.scheme() {
        "https" => Ok(()),
        "http" if loopback => Ok(()),
        scheme => Err(AppError::config(format!(
            "{} URL must use HTTPS, got '{}://'",
            label, scheme
        ))),
    }
}
