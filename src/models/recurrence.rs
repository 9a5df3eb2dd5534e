// file: src/models/recurrence.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AppError, AppResult};

/// Period a recurring event repeats on.
///
/// Stored as a lowercase string. Anything not recognised is kept verbatim
/// in `Unknown` so it can be written back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecurrenceKind {
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Unknown(String),
}

impl RecurrenceKind {
    pub fn as_str(&self) -> &str {
        match self {
            RecurrenceKind::None => "none",
            RecurrenceKind::Daily => "daily",
            RecurrenceKind::Weekly => "weekly",
            RecurrenceKind::Monthly => "monthly",
            RecurrenceKind::Yearly => "yearly",
            RecurrenceKind::Unknown(raw) => raw.as_str(),
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "" | "none" => RecurrenceKind::None,
            "daily" => RecurrenceKind::Daily,
            "weekly" => RecurrenceKind::Weekly,
            "monthly" => RecurrenceKind::Monthly,
            "yearly" => RecurrenceKind::Yearly,
            _ => RecurrenceKind::Unknown(raw.to_string()),
        }
    }

    pub fn is_recurring(&self) -> bool {
        !matches!(self, RecurrenceKind::None)
    }
}

impl From<String> for RecurrenceKind {
    fn from(raw: String) -> Self {
        RecurrenceKind::parse(&raw)
    }
}

impl From<RecurrenceKind> for String {
    fn from(kind: RecurrenceKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub kind: RecurrenceKind,
    pub interval: u32,
    pub end_date: Option<DateTime<Utc>>,
    pub count: Option<u32>,
}

impl RecurrenceRule {
    pub fn new(kind: RecurrenceKind, interval: u32) -> Self {
        Self {
            kind,
            interval,
            end_date: None,
            count: None,
        }
    }

    pub fn daily(interval: u32) -> Self {
        Self::new(RecurrenceKind::Daily, interval)
    }

    pub fn weekly(interval: u32) -> Self {
        Self::new(RecurrenceKind::Weekly, interval)
    }

    pub fn monthly(interval: u32) -> Self {
        Self::new(RecurrenceKind::Monthly, interval)
    }

    pub fn yearly(interval: u32) -> Self {
        Self::new(RecurrenceKind::Yearly, interval)
    }

    pub fn until(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn times(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Rejects rules that could never advance or never produce anything.
    ///
    /// `Unknown` kinds pass: they are preserved from storage and expand to
    /// the template occurrence only.
    pub fn validate(&self) -> AppResult<()> {
        if !self.kind.is_recurring() {
            return Ok(());
        }
        if self.interval < 1 {
            return Err(AppError::invalid_recurrence(format!(
                "interval must be at least 1 for a {} rule, got {}",
                self.kind, self.interval
            )));
        }
        if self.count == Some(0) {
            return Err(AppError::invalid_recurrence("count must be at least 1 when set"));
        }
        Ok(())
    }
}

/// How a month or year step resolves a day that does not exist in the
/// target month (e.g. the 31st stepping into February).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthEndPolicy {
    /// 2024-01-31 + 1 month = 2024-02-29
    #[default]
    Clamp,
    /// 2024-01-31 + 1 month = 2024-03-02
    Overflow,
}

impl MonthEndPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonthEndPolicy::Clamp => "clamp",
            MonthEndPolicy::Overflow => "overflow",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "clamp" => Some(MonthEndPolicy::Clamp),
            "overflow" => Some(MonthEndPolicy::Overflow),
            _ => None,
        }
    }
}
