pub mod expand;
pub mod ics;
pub mod service;

pub use expand::{expand, expand_occurrences, Expansion, ExpansionOptions, Termination, DEFAULT_MAX_STEPS};
pub use service::PlannerService;
