use anyhow::Result;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

pub const EMAIL_SERVICE: &str = "email_api";
pub const WEATHER_SERVICE: &str = "weather_api";

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_for: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            open_for: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn for_service(service_name: &str) -> Self {
        match service_name {
            // Outbound mail is user-visible; trip early and probe again soon.
            EMAIL_SERVICE => Self {
                failure_threshold: 3,
                success_threshold: 1,
                open_for: Duration::from_secs(30),
            },
            WEATHER_SERVICE => Self {
                failure_threshold: 5,
                success_threshold: 2,
                open_for: Duration::from_secs(120),
            },
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                opened_at: None,
            }),
        }
    }

    /// Fails fast with "circuit breaker is open" while the breaker is open.
    pub async fn execute<F, T, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        self.admit().await?;

        let result = operation().await;
        match &result {
            Ok(_) => self.on_success().await,
            Err(_) => self.on_failure().await,
        }
        result
    }

    async fn admit(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == CircuitState::Open {
            let cooled = inner
                .opened_at
                .map(|at| at.elapsed() >= self.config.open_for)
                .unwrap_or(true);
            if !cooled {
                anyhow::bail!("{}: circuit breaker is open", self.name);
            }
            inner.state = CircuitState::HalfOpen;
            inner.successes = 0;
            info!("Circuit breaker for {} half-open, probing", self.name);
        }
        Ok(())
    }

    async fn on_success(&self) {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.failures = 0;
                    inner.opened_at = None;
                    info!("Circuit breaker for {} closed", self.name);
                }
            }
            CircuitState::Closed | CircuitState::Open => {
                inner.state = CircuitState::Closed;
                inner.failures = 0;
            }
        }
    }

    async fn on_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.failures += 1;

        // A failed probe reopens immediately.
        let trip = inner.state == CircuitState::HalfOpen || inner.failures >= self.config.failure_threshold;
        if trip && inner.state != CircuitState::Open {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            warn!("Circuit breaker for {} opened after {} failure(s)", self.name, inner.failures);
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }
}

#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub async fn get_breaker(&self, service_name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(service_name) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write().await;
        breakers
            .entry(service_name.to_string())
            .or_insert_with(|| {
                info!("Created circuit breaker for service: {}", service_name);
                Arc::new(CircuitBreaker::new(
                    service_name,
                    CircuitBreakerConfig::for_service(service_name),
                ))
            })
            .clone()
    }
}

lazy_static::lazy_static! {
    pub static ref CIRCUIT_BREAKER_REGISTRY: CircuitBreakerRegistry = CircuitBreakerRegistry::default();
}

pub async fn get_circuit_breaker(service_name: &str) -> Arc<CircuitBreaker> {
    CIRCUIT_BREAKER_REGISTRY.get_breaker(service_name).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: 2,
                success_threshold: 1,
                open_for: Duration::from_secs(10),
            },
        )
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<()> {
        breaker.execute(|| async { Err(anyhow::anyhow!("502 bad gateway")) }).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_fails_fast() {
        let breaker = breaker();
        assert!(fail(&breaker).await.is_err());
        assert_eq!(breaker.state().await, CircuitState::Closed);
        assert!(fail(&breaker).await.is_err());
        assert_eq!(breaker.state().await, CircuitState::Open);

        let err = breaker.execute(|| async { Ok("sent") }).await.unwrap_err();
        assert!(err.to_string().contains("circuit breaker is open"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_probe_closes() {
        let breaker = breaker();
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(breaker.execute(|| async { Ok(7) }).await.unwrap(), 7);
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_probe_reopens() {
        let breaker = breaker();
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(fail(&breaker).await.is_err());
        assert_eq!(breaker.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_registry_reuses_breakers() {
        let registry = CircuitBreakerRegistry::default();
        let a = registry.get_breaker(EMAIL_SERVICE).await;
        let b = registry.get_breaker(EMAIL_SERVICE).await;
        assert!(Arc::ptr_eq(&a, &b));
    }
}
