//! Usage event recorder
//!
//! Merges one usage event into the persisted [`MetricsDocument`]:
//! - The user agent's record is moved to the end of its verb bucket with the
//!   new timestamp appended
//! - An attributed user's previous stamp is replaced by a fresh one
//!
//! Load, merge, and save run under the recorder's write lock, so two
//! concurrent `record` calls cannot overwrite each other's update.

use crate::store::MetricsStore;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tally_common::{AgentRecord, Clock, HttpVerb, MetricsDocument, Result, TallyError, UserStamp};
use tokio::sync::Mutex;
use tracing::{debug, error, instrument};

/// How a user id is matched against stored unique-user stamps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserMatching {
    /// The stamp's user-id field equals the user id
    #[default]
    Exact,
    /// The stamp text contains the user id anywhere
    ///
    /// Matches the behaviour of older deployments; "ann" also replaces
    /// "joanne"'s stamp.
    Substring,
}

impl UserMatching {
    pub fn matches(self, stamp: &UserStamp, user_id: &str) -> bool {
        match self {
            UserMatching::Exact => stamp.user_id().is_ok_and(|id| id == user_id),
            UserMatching::Substring => stamp.as_str().contains(user_id),
        }
    }
}

/// Recorder configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Unique-user matching rule
    #[serde(default)]
    pub user_matching: UserMatching,
}

/// One request to be metered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEvent {
    pub verb: HttpVerb,
    /// Client `User-Agent` header value
    pub user_agent: String,
    /// Independently authenticated caller, if any
    pub user_id: Option<String>,
}

impl UsageEvent {
    pub fn new(verb: HttpVerb, user_agent: impl Into<String>) -> Self {
        Self {
            verb,
            user_agent: user_agent.into(),
            user_id: None,
        }
    }

    /// Attribute the event to an authenticated user
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Validate the event
    pub fn validate(&self) -> Result<()> {
        if self.user_agent.is_empty() {
            return Err(TallyError::Validation("user_agent is required".into()));
        }
        if self.user_id.as_deref().is_some_and(str::is_empty) {
            return Err(TallyError::Validation("user_id cannot be empty".into()));
        }
        Ok(())
    }

    /// Merge this event into `doc` at time `now`
    pub fn apply(&self, doc: &mut MetricsDocument, now: i64, matching: UserMatching) {
        let bucket = doc.agents_mut(self.verb);
        let mut record = match bucket.iter().position(|r| r.user_agent == self.user_agent) {
            Some(idx) => bucket.remove(idx),
            None => AgentRecord::new(self.user_agent.clone()),
        };
        record.timestamps.push(now);
        bucket.push(record);

        if let Some(user_id) = &self.user_id {
            let stamps = doc.stamps_mut(self.verb);
            if let Some(idx) = stamps.iter().position(|s| matching.matches(s, user_id)) {
                stamps.remove(idx);
            }
            stamps.push(UserStamp::new(user_id, now));
        }
    }
}

/// Recorder metrics
#[derive(Debug, Default)]
pub struct RecorderMetrics {
    pub events_recorded: AtomicU64,
    pub unique_users_refreshed: AtomicU64,
    pub save_failures: AtomicU64,
}

/// Usage recorder
pub struct UsageRecorder {
    store: Arc<dyn MetricsStore>,
    clock: Arc<dyn Clock>,
    config: RecorderConfig,
    /// Held across load → merge → save
    write_lock: Mutex<()>,
    metrics: RecorderMetrics,
}

impl UsageRecorder {
    /// Create a new usage recorder
    pub fn new(store: Arc<dyn MetricsStore>, clock: Arc<dyn Clock>, config: RecorderConfig) -> Self {
        Self {
            store,
            clock,
            config,
            write_lock: Mutex::new(()),
            metrics: RecorderMetrics::default(),
        }
    }

    /// Record one request
    pub async fn record(&self, verb: HttpVerb, user_agent: &str, user_id: Option<&str>) -> Result<()> {
        let mut event = UsageEvent::new(verb, user_agent);
        event.user_id = user_id.map(str::to_owned);
        self.record_event(&event).await
    }

    /// Merge a usage event into the persisted document
    #[instrument(skip(self, event), fields(verb = %event.verb, user_agent = %event.user_agent))]
    pub async fn record_event(&self, event: &UsageEvent) -> Result<()> {
        event.validate()?;

        let _guard = self.write_lock.lock().await;

        let mut doc = self.store.load().await?.unwrap_or_default();
        let now = self.clock.now_millis();
        event.apply(&mut doc, now, self.config.user_matching);

        if let Err(e) = self.store.save(&doc).await {
            self.metrics.save_failures.fetch_add(1, Ordering::Relaxed);
            error!(error = %e, "Failed to save metrics document");
            return Err(e);
        }

        self.metrics.events_recorded.fetch_add(1, Ordering::Relaxed);
        if event.user_id.is_some() {
            self.metrics.unique_users_refreshed.fetch_add(1, Ordering::Relaxed);
        }
        debug!(now, "Recorded usage event");
        Ok(())
    }

    /// Get recorder metrics
    pub fn metrics(&self) -> &RecorderMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }
}
