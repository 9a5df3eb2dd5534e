// file: src/models/quotation.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationKind {
    Quotation,
    CostEstimate,
}

impl QuotationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationKind::Quotation => "quotation",
            QuotationKind::CostEstimate => "cost_estimate",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "quotation" => Ok(QuotationKind::Quotation),
            "cost_estimate" => Ok(QuotationKind::CostEstimate),
            _ => Err(format!("Unknown quotation kind: {}", raw)),
        }
    }

    /// Prefix of the human-facing document number.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            QuotationKind::Quotation => "Q",
            QuotationKind::CostEstimate => "CE",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuotationKind::Quotation => "Quotation",
            QuotationKind::CostEstimate => "Cost Estimate",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub site_code: Option<String>,
    pub quantity: u32,
    pub unit_price: f64,
    /// Rental months; production-only items use 1.
    pub months: u32,
}

impl LineItem {
    pub fn new(description: &str, quantity: u32, unit_price: f64, months: u32) -> Self {
        Self {
            description: description.to_string(),
            site_code: None,
            quantity,
            unit_price,
            months,
        }
    }

    pub fn amount(&self) -> f64 {
        round_money(f64::from(self.quantity) * self.unit_price * f64::from(self.months))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub subtotal: f64,
    pub discount: f64,
    pub taxable: f64,
    pub tax: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: String,
    pub company_id: String,
    pub proposal_id: Option<String>,
    pub kind: QuotationKind,
    pub number: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub items: Vec<LineItem>,
    /// Fraction, e.g. 0.12 for 12% VAT.
    pub tax_rate: f64,
    pub discount: f64,
    pub status: String, // draft | sent | accepted | rejected
    pub notes: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn totals(&self) -> Totals {
        let subtotal = round_money(self.items.iter().map(LineItem::amount).sum());
        let discount = round_money(self.discount.max(0.0).min(subtotal));
        let taxable = round_money(subtotal - discount);
        let tax = round_money(taxable * self.tax_rate);
        Totals {
            subtotal,
            discount,
            taxable,
            tax,
            total: round_money(taxable + tax),
        }
    }
}

/// Input for a new quotation; the number is assigned by storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQuotation {
    pub kind: QuotationKind,
    pub proposal_id: Option<String>,
    pub client_name: String,
    pub client_email: Option<String>,
    pub items: Vec<LineItem>,
    pub tax_rate: f64,
    pub discount: f64,
    pub notes: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct QuotationRow {
    pub id: String,
    pub company_id: String,
    pub proposal_id: Option<String>,
    pub kind: String,
    pub number: String,
    pub client_name: String,
    pub client_email: Option<String>,
    pub items: String,
    pub tax_rate: f64,
    pub discount: f64,
    pub status: String,
    pub notes: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<QuotationRow> for Quotation {
    type Error = anyhow::Error;

    fn try_from(row: QuotationRow) -> Result<Self, Self::Error> {
        Ok(Quotation {
            id: row.id,
            company_id: row.company_id,
            proposal_id: row.proposal_id,
            kind: QuotationKind::parse(&row.kind).map_err(|e| anyhow::anyhow!(e))?,
            number: row.number,
            client_name: row.client_name,
            client_email: row.client_email,
            items: serde_json::from_str(&row.items)?,
            tax_rate: row.tax_rate,
            discount: row.discount,
            status: row.status,
            notes: row.notes,
            valid_until: row.valid_until,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Two decimals, half away from zero.
pub fn round_money(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
