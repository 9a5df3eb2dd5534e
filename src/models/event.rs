// file: src/models/event.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::recurrence::{RecurrenceKind, RecurrenceRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Scheduled => "scheduled",
            EventStatus::Confirmed => "confirmed",
            EventStatus::Completed => "completed",
            EventStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "scheduled" => Ok(EventStatus::Scheduled),
            "confirmed" => Ok(EventStatus::Confirmed),
            "completed" => Ok(EventStatus::Completed),
            "cancelled" => Ok(EventStatus::Cancelled),
            _ => Err(format!("Unknown event status: {}", raw)),
        }
    }
}

/// What a planner entry is about. Free-form values survive as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Installation,
    Maintenance,
    Meeting,
    SiteVisit,
    Other(String),
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Installation => "installation",
            EventType::Maintenance => "maintenance",
            EventType::Meeting => "meeting",
            EventType::SiteVisit => "site_visit",
            EventType::Other(raw) => raw.as_str(),
        }
    }
}

impl From<String> for EventType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "installation" => EventType::Installation,
            "maintenance" => EventType::Maintenance,
            "meeting" => EventType::Meeting,
            "site_visit" => EventType::SiteVisit,
            _ => EventType::Other(raw),
        }
    }
}

impl From<EventType> for String {
    fn from(kind: EventType) -> Self {
        kind.as_str().to_string()
    }
}

/// A planner entry. When `recurrence` is set this is the template: its
/// `start`/`end` are the first occurrence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub company_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub recurrence: Option<RecurrenceRule>,
    pub created_by: String,
    pub client_id: Option<String>,
    pub status: EventStatus,
    pub event_type: EventType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CalendarEvent {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_recurring(&self) -> bool {
        self.recurrence
            .as_ref()
            .map(|rule| rule.kind.is_recurring())
            .unwrap_or(false)
    }

    /// Both bounds inclusive.
    pub fn overlaps(&self, window_start: DateTime<Utc>, window_end: DateTime<Utc>) -> bool {
        self.start <= window_end && self.end >= window_start
    }
}

/// Flat row shape of the `events` table.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: String,
    pub company_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub all_day: bool,
    pub recurrence_type: Option<String>,
    pub recurrence_interval: Option<i64>,
    pub recurrence_end_date: Option<DateTime<Utc>>,
    pub recurrence_count: Option<i64>,
    pub created_by: String,
    pub client_id: Option<String>,
    pub status: String,
    pub event_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for CalendarEvent {
    type Error = anyhow::Error;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let status = EventStatus::parse(&row.status).map_err(|e| anyhow::anyhow!(e))?;

        // Negative values in storage are clamped to 0 and never advance.
        let recurrence = row.recurrence_type.map(|raw| RecurrenceRule {
            kind: RecurrenceKind::parse(&raw),
            interval: row
                .recurrence_interval
                .map(|i| u32::try_from(i.max(0)).unwrap_or(u32::MAX))
                .unwrap_or(1),
            end_date: row.recurrence_end_date,
            count: row
                .recurrence_count
                .map(|c| u32::try_from(c.max(0)).unwrap_or(u32::MAX)),
        });

        Ok(CalendarEvent {
            id: row.id,
            company_id: row.company_id,
            title: row.title,
            description: row.description,
            location: row.location,
            start: row.start_time,
            end: row.end_time,
            all_day: row.all_day,
            recurrence,
            created_by: row.created_by,
            client_id: row.client_id,
            status,
            event_type: EventType::from(row.event_type),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Fields a caller supplies when creating an event. The owner and company
/// come from the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    pub recurrence: Option<RecurrenceRule>,
    pub client_id: Option<String>,
    pub event_type: EventType,
}

impl NewEvent {
    pub fn new(title: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            title: title.to_string(),
            description: None,
            location: None,
            start,
            end,
            all_day: false,
            recurrence: None,
            client_id: None,
            event_type: EventType::Meeting,
        }
    }

    pub fn with_recurrence(mut self, rule: RecurrenceRule) -> Self {
        self.recurrence = Some(rule);
        self
    }
}

/// Partial update; `None` leaves the field untouched. `recurrence:
/// Some(None)` clears the rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub all_day: Option<bool>,
    pub recurrence: Option<Option<RecurrenceRule>>,
    pub client_id: Option<Option<String>>,
    pub status: Option<EventStatus>,
    pub event_type: Option<EventType>,
}

impl EventPatch {
    pub fn apply(self, event: &mut CalendarEvent) {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(location) = self.location {
            event.location = location;
        }
        if let Some(start) = self.start {
            event.start = start;
        }
        if let Some(end) = self.end {
            event.end = end;
        }
        if let Some(all_day) = self.all_day {
            event.all_day = all_day;
        }
        if let Some(recurrence) = self.recurrence {
            event.recurrence = recurrence;
        }
        if let Some(client_id) = self.client_id {
            event.client_id = client_id;
        }
        if let Some(status) = self.status {
            event.status = status;
        }
        if let Some(event_type) = self.event_type {
            event.event_type = event_type;
        }
    }
}

/// A concrete, computed instance of an event inside a query window.
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub event: CalendarEvent,
    pub is_recurring_instance: bool,
    pub original_event_id: Option<String>,
    /// Step index from the template; 0 is the template itself.
    pub sequence: u32,
}

impl Occurrence {
    pub fn start(&self) -> DateTime<Utc> {
        self.event.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.event.end
    }

    pub fn instance_id(template_id: &str, sequence: u32) -> String {
        format!("{}-instance-{}", template_id, sequence)
    }
}
