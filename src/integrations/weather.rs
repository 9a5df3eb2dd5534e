use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::http_config::HttpConfig;
use crate::utils::circuit_breaker::{get_circuit_breaker, WEATHER_SERVICE};
use crate::utils::retry::{retry_with_exponential_backoff, RetryConfig};

pub const MAX_FORECAST_DAYS: u32 = 16;

/// Rain probability (percent) at or above which outdoor installs are postponed.
pub const DEFAULT_RAIN_THRESHOLD: f64 = 40.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub temperature_max: Option<f64>,
    pub temperature_min: Option<f64>,
    /// Percent, 0..=100.
    pub precipitation_probability: Option<f64>,
}

/// Unknown rain probability counts as not ok.
pub fn is_installation_weather_ok(day: &DailyForecast, threshold: f64) -> bool {
    day.precipitation_probability
        .map(|p| p < threshold)
        .unwrap_or(false)
}

#[derive(Deserialize)]
struct ForecastResponse {
    daily: DailySeries,
}

#[derive(Deserialize)]
struct DailySeries {
    time: Vec<String>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
}

/// Parse a column-oriented daily forecast. Short columns read as missing
/// values rather than failing the whole response.
pub fn parse_forecast(body: &str) -> AppResult<Vec<DailyForecast>> {
    let response: ForecastResponse = serde_json::from_str(body)
        .map_err(|e| AppError::operation_failed(format!("unexpected forecast payload: {}", e)))?;
    let daily = response.daily;

    let value = |column: &[Option<f64>], i: usize| column.get(i).copied().flatten();

    daily
        .time
        .iter()
        .enumerate()
        .map(|(i, day)| {
            let date = NaiveDate::parse_from_str(day, "%Y-%m-%d")
                .map_err(|_| AppError::operation_failed(format!("bad forecast date '{}'", day)))?;
            Ok(DailyForecast {
                date,
                temperature_max: value(&daily.temperature_2m_max, i),
                temperature_min: value(&daily.temperature_2m_min, i),
                precipitation_probability: value(&daily.precipitation_probability_max, i),
            })
        })
        .collect()
}

pub struct WeatherClient {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl WeatherClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = HttpConfig::weather();
        Ok(Self {
            client: http.build_client()?,
            base_url: config.weather_api_url.clone(),
            retry: http.to_retry_config(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn forecast_url(&self, latitude: f64, longitude: f64, days: u32) -> AppResult<Url> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(AppError::invalid_input("coordinates out of range"));
        }
        let days = days.clamp(1, MAX_FORECAST_DAYS);

        Url::parse_with_params(
            &self.base_url,
            &[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                (
                    "daily",
                    "temperature_2m_max,temperature_2m_min,precipitation_probability_max".to_string(),
                ),
                ("forecast_days", days.to_string()),
                ("timezone", "auto".to_string()),
            ],
        )
        .map_err(|e| AppError::config(format!("invalid weather API URL: {}", e)))
    }

    /// Daily forecast for a site, `days` clamped to `1..=MAX_FORECAST_DAYS`.
    pub async fn forecast(&self, latitude: f64, longitude: f64, days: u32) -> AppResult<Vec<DailyForecast>> {
        let url = self.forecast_url(latitude, longitude, days)?;
        let breaker = get_circuit_breaker(WEATHER_SERVICE).await;
        let (client, url, breaker) = (&self.client, &url, &breaker);

        let retried = retry_with_exponential_backoff(&self.retry, |_| async move {
            breaker
                .execute(|| async {
                    let response = client.get(url.clone()).send().await?;
                    let status = response.status();
                    if !status.is_success() {
                        anyhow::bail!("weather API returned {}", status);
                    }
                    Ok(response.text().await?)
                })
                .await
        })
        .await
        .map_err(|e| AppError::operation_failed(format!("forecast unavailable: {:#}", e)))?;

        let days = parse_forecast(&retried.value)?;
        log::debug!("Fetched {} forecast day(s) for {:.3},{:.3}", days.len(), latitude, longitude);
        Ok(days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::test_server;
    use std::time::Duration;

    const SAMPLE: &str = r#"{
        "latitude": 14.55,
        "longitude": 121.02,
        "daily_units": {"time": "iso8601", "precipitation_probability_max": "%"},
        "daily": {
            "time": ["2024-07-01", "2024-07-02", "2024-07-03"],
            "temperature_2m_max": [32.1, 30.4, null],
            "temperature_2m_min": [26.0, 25.2, 25.0],
            "precipitation_probability_max": [15, 85]
        }
    }"#;

    fn client(base_url: &str) -> WeatherClient {
        let config = AppConfig {
            weather_api_url: base_url.to_string(),
            ..AppConfig::default()
        };
        WeatherClient::new(&config).unwrap().with_retry(RetryConfig {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
        })
    }

    #[test]
    fn test_parse_forecast() {
        let days = parse_forecast(SAMPLE).unwrap();
        assert_eq!(days.len(), 3);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
        assert_eq!(days[0].temperature_max, Some(32.1));
        assert_eq!(days[2].temperature_max, None);
        assert_eq!(days[1].precipitation_probability, Some(85.0));
        assert_eq!(days[2].precipitation_probability, None);
    }

    #[test]
    fn test_parse_forecast_rejects_garbage() {
        assert!(parse_forecast(r#"{"hourly": {}}"#).is_err());
        assert!(parse_forecast(r#"{"daily": {"time": ["July 1"]}}"#).is_err());
    }

    #[test]
    fn test_installation_weather() {
        let days = parse_forecast(SAMPLE).unwrap();
        assert!(is_installation_weather_ok(&days[0], DEFAULT_RAIN_THRESHOLD));
        assert!(!is_installation_weather_ok(&days[1], DEFAULT_RAIN_THRESHOLD));
        assert!(!is_installation_weather_ok(&days[2], DEFAULT_RAIN_THRESHOLD));
    }

    #[test]
    fn test_forecast_url() {
        let url = client("https://api.open-meteo.com/v1/forecast")
            .forecast_url(14.5547, 121.0244, 40)
            .unwrap();
        let query = url.query().unwrap_or_default();
        assert!(query.contains("latitude=14.5547"));
        assert!(query.contains("forecast_days=16"));

        let err = client("https://api.open-meteo.com/v1/forecast")
            .forecast_url(95.0, 0.0, 3)
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_forecast_fetches_and_parses() {
        let (url, server) = test_server::serve(vec![(200, SAMPLE.to_string())]).await;

        let days = client(&format!("{}/v1/forecast", url)).forecast(14.55, 121.02, 3).await.unwrap();
        assert_eq!(days.len(), 3);

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /v1/forecast?latitude=14.55"));
    }
}
