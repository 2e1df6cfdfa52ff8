//! # Tally Common
//!
//! Shared types, errors, and the report authorization gate for Tally.
//!
//! ## Core Types
//!
//! - [`HttpVerb`]: the metered request methods (GET and POST)
//! - [`MetricsDocument`]: the persisted usage aggregate
//! - [`AgentRecord`]/[`UserStamp`]: per user-agent timestamps and unique-user stamps
//! - [`WindowCounts`]/[`Report`]: rolled-up report types
//!
//! ## Security
//!
//! - [`security::auth`]: bearer-key authorization for the report endpoint

pub mod clock;
pub mod error;
pub mod security;
pub mod types;

// Re-export commonly used types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, TallyError};
pub use security::auth::{AuthError, AuthorizationGate};
pub use types::{
    document::{AgentRecord, MetricsDocument, StampError, UserStamp, DOCUMENT_VERSION},
    report::{PerVerb, Report, ReportOutcome, WindowCounts},
    verb::HttpVerb,
};

/// Tally version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Length of the "last day" window in milliseconds
pub const DAY_MS: i64 = 86_400_000;

/// Length of the "last week" window in milliseconds
pub const WEEK_MS: i64 = 604_800_000;

/// Length of the "last month" window in milliseconds (30.44 days)
pub const MONTH_MS: i64 = 2_629_800_000;
