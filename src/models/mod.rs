// Declare modules
pub mod company;
pub mod event;
pub mod notification;
pub mod proposal;
pub mod quotation;
pub mod recurrence;
pub mod settings;

// Flattened so callers can write `use crate::models::CalendarEvent`.
pub use company::{Company, Role, Subscription, User};
pub use event::{CalendarEvent, EventPatch, EventStatus, EventType, NewEvent, Occurrence};
pub use notification::Notification;
pub use proposal::{Proposal, ProposalFilter, ProposalStatus};
pub use quotation::{LineItem, NewQuotation, Quotation, QuotationKind, Totals};
pub use recurrence::{MonthEndPolicy, RecurrenceKind, RecurrenceRule};
pub use settings::{PlannerSettings, Setting};
