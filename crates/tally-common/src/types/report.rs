//! Usage report types

use crate::types::verb::HttpVerb;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Event counts over the trailing windows
///
/// Windows are nested: `last_day <= last_week <= last_month <= total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowCounts {
    pub total: u64,
    pub last_day: u64,
    pub last_week: u64,
    pub last_month: u64,
}

/// One value per metered verb
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerVerb<T> {
    pub get: T,
    pub post: T,
}

impl<T> PerVerb<T> {
    /// Build by evaluating `f` once per verb
    pub fn from_fn(mut f: impl FnMut(HttpVerb) -> T) -> Self {
        Self {
            get: f(HttpVerb::Get),
            post: f(HttpVerb::Post),
        }
    }

    pub fn for_verb(&self, verb: HttpVerb) -> &T {
        match verb {
            HttpVerb::Get => &self.get,
            HttpVerb::Post => &self.post,
        }
    }
}

/// Rolled-up usage report
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Window counts per user agent, per verb
    pub usage_by_user_agent: PerVerb<BTreeMap<String, WindowCounts>>,
    /// Window counts over unique-user stamps, per verb
    pub unique_users_by_window: PerVerb<WindowCounts>,
}

/// Result of a report request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Report(Report),
    /// No usage has ever been recorded
    NotFound,
}

impl ReportOutcome {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReportOutcome::NotFound)
    }

    pub fn into_report(self) -> Option<Report> {
        match self {
            ReportOutcome::Report(report) => Some(report),
            ReportOutcome::NotFound => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_json_shape() {
        let mut report = Report::default();
        report.usage_by_user_agent.get.insert(
            "curl/7.0".into(),
            WindowCounts {
                total: 2,
                last_day: 2,
                last_week: 2,
                last_month: 2,
            },
        );

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(
            value,
            json!({
                "usageByUserAgent": {
                    "get": { "curl/7.0": { "total": 2, "lastDay": 2, "lastWeek": 2, "lastMonth": 2 } },
                    "post": {}
                },
                "uniqueUsersByWindow": {
                    "get": { "total": 0, "lastDay": 0, "lastWeek": 0, "lastMonth": 0 },
                    "post": { "total": 0, "lastDay": 0, "lastWeek": 0, "lastMonth": 0 }
                }
            })
        );
    }

    #[test]
    fn test_per_verb_from_fn() {
        let per = PerVerb::from_fn(|verb| verb.as_str().len());
        assert_eq!(*per.for_verb(HttpVerb::Get), 3);
        assert_eq!(*per.for_verb(HttpVerb::Post), 4);
    }

    #[test]
    fn test_outcome_into_report() {
        assert!(ReportOutcome::NotFound.is_not_found());
        assert!(ReportOutcome::NotFound.into_report().is_none());
        assert!(ReportOutcome::Report(Report::default()).into_report().is_some());
    }
}
