// OOH Planner library
// Planner, sales documents and integrations for out-of-home advertising operators

pub mod config;
pub mod context;
pub mod database;
pub mod documents;
pub mod error;
pub mod http_config;
pub mod integrations;
pub mod models;
pub mod planner;
pub mod sales;
pub mod scheduler;
pub mod subscription;
pub mod utils;

// Re-export commonly used types
pub use context::{AppContext, Session};
pub use database::{Database, Page, PageRequest};
pub use error::{AppError, AppResult};
pub use models::*;
pub use planner::{expand_occurrences, ExpansionOptions, PlannerService};
pub use sales::SalesService;
