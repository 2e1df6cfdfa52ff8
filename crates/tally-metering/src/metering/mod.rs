//! Metering module
//!
//! Provides usage event recording and windowed aggregation:
//! - UsageRecorder: Merges usage events into the persisted document
//! - WindowedAggregator: Counts events over trailing day/week/month windows

pub mod aggregator;
pub mod recorder;

pub use aggregator::{Window, WindowedAggregator};
pub use recorder::{RecorderConfig, RecorderMetrics, UsageEvent, UsageRecorder, UserMatching};
