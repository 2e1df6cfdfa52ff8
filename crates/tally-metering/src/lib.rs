//! # Tally Metering
//!
//! Usage recording, windowed aggregation, and report generation.
//!
//! ## Flow
//!
//! ```text
//! request ──► UsageRecorder ──load/save──► MetricsStore
//!                                              │
//! /usage  ──► ReportGenerator ──load───────────┘
//!                  │
//!                  └──► WindowedAggregator (total / day / week / month)
//! ```
//!
//! Recording is a full read-modify-write of the [`MetricsDocument`]; a
//! recorder serializes its own writes so concurrent requests never drop
//! events.
//!
//! [`MetricsDocument`]: tally_common::MetricsDocument

pub mod metering;
pub mod report;
pub mod store;

pub use metering::{
    RecorderConfig, RecorderMetrics, UsageEvent, UsageRecorder, UserMatching, Window,
    WindowedAggregator,
};
pub use report::ReportGenerator;
pub use store::{InMemoryStore, JsonFileStore, MetricsStore};

use std::sync::Arc;
use tally_common::{Clock, HttpVerb, ReportOutcome, Result, SystemClock};

/// Recorder and report generator sharing one store and clock
pub struct MeteringService {
    recorder: UsageRecorder,
    reports: ReportGenerator,
}

impl MeteringService {
    pub fn new(store: Arc<dyn MetricsStore>, clock: Arc<dyn Clock>, config: RecorderConfig) -> Self {
        Self {
            recorder: UsageRecorder::new(store.clone(), clock.clone(), config),
            reports: ReportGenerator::new(store, clock),
        }
    }

    /// Service on the system clock
    pub fn with_store(store: Arc<dyn MetricsStore>, config: RecorderConfig) -> Self {
        Self::new(store, Arc::new(SystemClock), config)
    }

    /// Record one usage event
    pub async fn record(&self, verb: HttpVerb, user_agent: &str, user_id: Option<&str>) -> Result<()> {
        self.recorder.record(verb, user_agent, user_id).await
    }

    /// Produce the current usage report
    pub async fn generate(&self) -> Result<ReportOutcome> {
        self.reports.generate().await
    }

    pub fn recorder(&self) -> &UsageRecorder {
        &self.recorder
    }

    pub fn reports(&self) -> &ReportGenerator {
        &self.reports
    }
}
