// file: src/models/proposal.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    Sent,
    Accepted,
    Declined,
    Expired,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Draft => "draft",
            ProposalStatus::Sent => "sent",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::Declined => "declined",
            ProposalStatus::Expired => "expired",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "draft" => Ok(ProposalStatus::Draft),
            "sent" => Ok(ProposalStatus::Sent),
            "accepted" => Ok(ProposalStatus::Accepted),
            "declined" => Ok(ProposalStatus::Declined),
            "expired" => Ok(ProposalStatus::Expired),
            _ => Err(format!("Unknown proposal status: {}", raw)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: String,
    pub company_id: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub title: String,
    pub status: ProposalStatus,
    /// Billboard/site codes offered in this proposal.
    pub sites: Vec<String>,
    pub notes: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    pub fn new(company_id: &str, created_by: &str, client_name: &str, title: &str) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            company_id: company_id.to_string(),
            client_name: client_name.to_string(),
            client_email: None,
            title: title.to_string(),
            status: ProposalStatus::Draft,
            sites: Vec::new(),
            notes: None,
            valid_until: None,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.map(|v| v < now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ProposalRow {
    pub id: String,
    pub company_id: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub title: String,
    pub status: String,
    pub sites: String,
    pub notes: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<ProposalRow> for Proposal {
    type Error = anyhow::Error;

    fn try_from(row: ProposalRow) -> Result<Self, Self::Error> {
        Ok(Proposal {
            id: row.id,
            company_id: row.company_id,
            client_name: row.client_name,
            client_email: row.client_email,
            title: row.title,
            status: ProposalStatus::parse(&row.status).map_err(|e| anyhow::anyhow!(e))?,
            sites: serde_json::from_str(&row.sites)?,
            notes: row.notes,
            valid_until: row.valid_until,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Criteria for a proposal search. Empty fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct ProposalFilter {
    /// Case-insensitive substring of client name or title.
    pub text: Option<String>,
    pub status: Option<ProposalStatus>,
    pub created_by: Option<String>,
}
