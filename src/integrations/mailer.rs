use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::documents;
use crate::error::{AppError, AppResult};
use crate::http_config::HttpConfig;
use crate::models::{Company, Quotation};
use crate::utils::circuit_breaker::{get_circuit_breaker, EMAIL_SERVICE};
use crate::utils::logging::log_delivery;
use crate::utils::retry::{retry_with_exponential_backoff, RetryConfig};

lazy_static::lazy_static! {
    static ref ADDRESS: Option<Regex> =
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").ok();
}

pub fn is_valid_address(address: &str) -> bool {
    ADDRESS
        .as_ref()
        .map(|pattern| pattern.is_match(address.trim()))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Sent as the `Idempotency-Key` header on every attempt, so a retried
    /// request the provider already accepted is not delivered twice.
    /// Generated per send when unset.
    #[serde(skip)]
    pub idempotency_key: Option<String>,
}

impl OutgoingEmail {
    pub fn validate(&self) -> AppResult<()> {
        if self.to.is_empty() {
            return Err(AppError::invalid_input("email needs at least one recipient"));
        }
        // The offending address is not echoed back.
        let invalid = self.to.iter().chain(&self.reply_to).filter(|a| !is_valid_address(a)).count();
        if invalid > 0 {
            return Err(AppError::invalid_input(format!("{} invalid email address(es)", invalid)));
        }
        if self.subject.trim().is_empty() {
            return Err(AppError::invalid_input("email subject is required"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub attempts: u32,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<DeliveryReceipt>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    #[serde(flatten)]
    email: &'a OutgoingEmail,
}

#[derive(Deserialize)]
struct SendResponse {
    id: String,
}

/// Posts JSON to the configured email API.
pub struct HttpMailer {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
    retry: RetryConfig,
    service: String,
}

impl HttpMailer {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        Self::with_http(config, HttpConfig::email())
    }

    pub fn with_http(config: &AppConfig, http: HttpConfig) -> AppResult<Self> {
        Ok(Self {
            client: http.build_client()?,
            endpoint: config.email_api_url.clone(),
            api_key: config.email_api_key.clone(),
            from: config.email_from.clone(),
            retry: http.to_retry_config(),
            service: EMAIL_SERVICE.to_string(),
        })
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Key of the circuit breaker guarding this mailer.
    pub fn with_service(mut self, service: &str) -> Self {
        self.service = service.to_string();
        self
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, email: &OutgoingEmail) -> AppResult<DeliveryReceipt> {
        email.validate()?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::config("OOH_EMAIL_API_KEY is not set"))?;

        let idempotency_key = email
            .idempotency_key
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let breaker = get_circuit_breaker(&self.service).await;
        let payload = SendRequest { from: &self.from, email };
        let (client, endpoint, breaker, payload, idempotency_key) =
            (&self.client, &self.endpoint, &breaker, &payload, idempotency_key.as_str());

        let retried = retry_with_exponential_backoff(&self.retry, |attempt| async move {
            log::debug!("Email API attempt {}", attempt);
            breaker
                .execute(|| async {
                    let response = client
                        .post(endpoint.as_str())
                        .bearer_auth(api_key)
                        .header("Idempotency-Key", idempotency_key)
                        .json(payload)
                        .send()
                        .await?;

                    let status = response.status();
                    if !status.is_success() {
                        let body = response.text().await.unwrap_or_default();
                        let excerpt: String = body.chars().take(200).collect();
                        anyhow::bail!("email API returned {}: {}", status, excerpt);
                    }

                    let parsed: SendResponse = response.json().await?;
                    Ok(parsed.id)
                })
                .await
        })
        .await
        .map_err(|e| AppError::delivery(format!("{:#}", e)))?;

        log_delivery("email", &retried.value, retried.attempts);
        Ok(DeliveryReceipt {
            message_id: retried.value,
            attempts: retried.attempts,
        })
    }
}

/// Email a rendered quotation to its client, with the text rendering attached.
pub async fn send_quotation(
    mailer: &dyn Mailer,
    quotation: &Quotation,
    company: &Company,
    reply_to: Option<&str>,
) -> AppResult<DeliveryReceipt> {
    let to = quotation
        .client_email
        .clone()
        .ok_or_else(|| AppError::invalid_input(format!("{} has no client email", quotation.number)))?;

    let document = documents::render(quotation, company);
    let totals = quotation.totals();
    let label = quotation.kind.label();

    let email = OutgoingEmail {
        to: vec![to],
        subject: format!("{} {} from {}", label, quotation.number, company.name),
        text: format!(
            "Hello {},\n\nPlease find attached {} {} for a total of {}.\n\nThank you,\n{}\n",
            quotation.client_name,
            label.to_lowercase(),
            quotation.number,
            documents::format_money(totals.total),
            company.name
        ),
        reply_to: reply_to.map(str::to_string),
        attachments: vec![Attachment {
            filename: format!("{}.txt", quotation.number),
            content_type: "text/plain".to_string(),
            content: document.to_text(),
        }],
        idempotency_key: Some(format!("{}-{}", quotation.number, uuid::Uuid::new_v4())),
    };

    mailer.send(&email).await
}
