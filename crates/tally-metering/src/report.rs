//! Usage report generation

use crate::metering::WindowedAggregator;
use crate::store::MetricsStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tally_common::{Clock, MetricsDocument, PerVerb, Report, ReportOutcome, Result};
use tracing::{debug, instrument};

/// Builds usage reports from the persisted document
pub struct ReportGenerator {
    store: Arc<dyn MetricsStore>,
    clock: Arc<dyn Clock>,
}

impl ReportGenerator {
    pub fn new(store: Arc<dyn MetricsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Load the document and roll it up, `NotFound` if nothing was ever recorded
    #[instrument(skip(self))]
    pub async fn generate(&self) -> Result<ReportOutcome> {
        let Some(doc) = self.store.load().await? else {
            debug!("No metrics document, report not found");
            return Ok(ReportOutcome::NotFound);
        };

        let report = build_report(&doc, self.clock.now_millis());
        debug!(
            get_agents = report.usage_by_user_agent.get.len(),
            post_agents = report.usage_by_user_agent.post.len(),
            "Generated usage report"
        );
        Ok(ReportOutcome::Report(report))
    }
}

/// Roll up `doc` with every window evaluated at `now`
pub fn build_report(doc: &MetricsDocument, now: i64) -> Report {
    let aggregator = WindowedAggregator::at(now);

    let usage_by_user_agent = PerVerb::from_fn(|verb| {
        let mut agents = BTreeMap::new();
        for record in doc.agents(verb) {
            let counts = aggregator.count_timestamps(record.timestamps.iter().copied());
            agents.insert(record.user_agent.clone(), counts);
        }
        agents
    });
    let unique_users_by_window = PerVerb::from_fn(|verb| aggregator.count_stamps(doc.stamps(verb)));

    Report {
        usage_by_user_agent,
        unique_users_by_window,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use tally_common::{AgentRecord, HttpVerb, ManualClock, UserStamp, WindowCounts, DAY_MS};

    const NOW: i64 = 1_700_000_000_000;

    #[tokio::test]
    async fn test_not_found_before_any_record() {
        let generator = ReportGenerator::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(ManualClock::new(NOW)),
        );

        assert!(generator.generate().await.unwrap().is_not_found());
        assert!(generator.generate().await.unwrap().is_not_found());
    }

    #[tokio::test]
    async fn test_empty_document_is_an_empty_report() {
        let generator = ReportGenerator::new(
            Arc::new(InMemoryStore::with_document(MetricsDocument::new())),
            Arc::new(ManualClock::new(NOW)),
        );

        let report = generator.generate().await.unwrap().into_report().unwrap();
        assert_eq!(report, Report::default());
    }

    #[test]
    fn test_build_report_per_dimension() {
        let mut doc = MetricsDocument::new();
        doc.agents_mut(HttpVerb::Get).push(AgentRecord {
            user_agent: "curl/7.0".into(),
            timestamps: vec![NOW - 3 * DAY_MS, NOW - 1_000],
        });
        doc.agents_mut(HttpVerb::Post).push(AgentRecord {
            user_agent: "uploader".into(),
            timestamps: vec![NOW - 60 * DAY_MS],
        });
        doc.stamps_mut(HttpVerb::Post).push(UserStamp::new("alice", NOW - 1_000));
        doc.stamps_mut(HttpVerb::Post).push(UserStamp::new("bob", NOW - 2 * DAY_MS));

        let report = build_report(&doc, NOW);

        assert_eq!(
            report.usage_by_user_agent.get["curl/7.0"],
            WindowCounts {
                total: 2,
                last_day: 1,
                last_week: 2,
                last_month: 2,
            }
        );
        assert_eq!(
            report.usage_by_user_agent.post["uploader"],
            WindowCounts {
                total: 1,
                ..WindowCounts::default()
            }
        );
        assert_eq!(report.unique_users_by_window.get, WindowCounts::default());
        assert_eq!(
            report.unique_users_by_window.post,
            WindowCounts {
                total: 2,
                last_day: 1,
                last_week: 2,
                last_month: 2,
            }
        );
    }
}
