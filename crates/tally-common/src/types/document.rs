//! Persisted usage aggregate
//!
//! The [`MetricsDocument`] is loaded, mutated, and saved in full on every
//! recorded event. It only ever grows: nothing is expired or deleted.

use crate::error::{Result, TallyError};
use crate::types::verb::HttpVerb;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// Current schema version of [`MetricsDocument`]
pub const DOCUMENT_VERSION: u32 = 1;

/// Key of the unique-user section in legacy documents
const LEGACY_UNIQUE_USERS_KEY: &str = "unique-users";

/// Separator between user id and timestamp in a [`UserStamp`]
const STAMP_SEPARATOR: char = '~';

/// Timestamps of every recorded event from one user agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    /// Client `User-Agent` value, the record's identity within a bucket
    pub user_agent: String,
    /// Event times (Unix millis), oldest first
    pub timestamps: Vec<i64>,
}

impl AgentRecord {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            timestamps: Vec::new(),
        }
    }
}

/// Malformed unique-user stamp
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StampError {
    #[error("Malformed unique-user stamp: {stamp:?}")]
    Malformed { stamp: String },
}

/// A user's most recent visit, stored compactly as `"<userId>~<timestampMillis>"`
///
/// The stamp is split at the last `~`, so user ids may themselves contain `~`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserStamp(String);

impl UserStamp {
    pub fn new(user_id: &str, timestamp: i64) -> Self {
        Self(format!("{user_id}{STAMP_SEPARATOR}{timestamp}"))
    }

    /// Wrap a stamp string as persisted, without validating it
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(user_id, timestamp)`
    pub fn parse(&self) -> std::result::Result<(&str, i64), StampError> {
        let malformed = || StampError::Malformed {
            stamp: self.0.clone(),
        };
        let (user_id, timestamp) = self.0.rsplit_once(STAMP_SEPARATOR).ok_or_else(malformed)?;
        let timestamp = timestamp.parse::<i64>().map_err(|_| malformed())?;
        Ok((user_id, timestamp))
    }

    pub fn user_id(&self) -> std::result::Result<&str, StampError> {
        self.parse().map(|(user_id, _)| user_id)
    }

    pub fn timestamp(&self) -> std::result::Result<i64, StampError> {
        self.parse().map(|(_, timestamp)| timestamp)
    }
}

impl fmt::Display for UserStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Root usage aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsDocument {
    /// Schema version
    pub version: u32,
    /// Per-verb user-agent records, most recently active last
    #[serde(default)]
    pub method_buckets: BTreeMap<HttpVerb, Vec<AgentRecord>>,
    /// Per-verb unique-user stamps, most recently active last
    #[serde(default)]
    pub unique_users: BTreeMap<HttpVerb, Vec<UserStamp>>,
}

impl Default for MetricsDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsDocument {
    /// Create an empty document at the current schema version
    pub fn new() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            method_buckets: BTreeMap::new(),
            unique_users: BTreeMap::new(),
        }
    }

    /// User-agent records for a verb
    pub fn agents(&self, verb: HttpVerb) -> &[AgentRecord] {
        self.method_buckets
            .get(&verb)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Unique-user stamps for a verb
    pub fn stamps(&self, verb: HttpVerb) -> &[UserStamp] {
        self.unique_users
            .get(&verb)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn agents_mut(&mut self, verb: HttpVerb) -> &mut Vec<AgentRecord> {
        self.method_buckets.entry(verb).or_default()
    }

    pub fn stamps_mut(&mut self, verb: HttpVerb) -> &mut Vec<UserStamp> {
        self.unique_users.entry(verb).or_default()
    }

    /// Find the record for a user agent within a verb's bucket
    pub fn agent(&self, verb: HttpVerb, user_agent: &str) -> Option<&AgentRecord> {
        self.agents(verb).iter().find(|r| r.user_agent == user_agent)
    }

    /// Total number of recorded events across all verbs
    pub fn event_count(&self) -> usize {
        self.method_buckets
            .values()
            .flatten()
            .map(|r| r.timestamps.len())
            .sum()
    }

    /// Convert the untyped JSON tree written by older deployments
    ///
    /// Expected shape:
    /// `{"get":[{"<ua>":[ts,..]},..], "post":[..], "unique-users":{"get":["id~ts",..], "post":[..]}}`
    pub fn from_legacy_json(value: &Value) -> Result<Self> {
        let root = value.as_object().ok_or_else(|| {
            TallyError::Serialization("legacy metrics document is not a JSON object".into())
        })?;

        let mut doc = Self::new();
        for verb in HttpVerb::ALL {
            if let Some(entries) = root.get(verb.as_str()).and_then(Value::as_array) {
                for entry in entries {
                    let Some(agents) = entry.as_object() else {
                        warn!(%verb, "Skipping non-object user agent entry in legacy document");
                        continue;
                    };
                    for (user_agent, times) in agents {
                        let raw = times.as_array().map(Vec::as_slice).unwrap_or_default();
                        let timestamps: Vec<i64> = raw.iter().filter_map(Value::as_i64).collect();
                        if timestamps.len() != raw.len() {
                            warn!(
                                %verb,
                                user_agent = %user_agent,
                                skipped = raw.len() - timestamps.len(),
                                "Skipping non-integer timestamps in legacy document"
                            );
                        }
                        let bucket = doc.agents_mut(verb);
                        match bucket.iter_mut().find(|r| &r.user_agent == user_agent) {
                            Some(existing) => existing.timestamps.extend(timestamps),
                            None => bucket.push(AgentRecord {
                                user_agent: user_agent.clone(),
                                timestamps,
                            }),
                        }
                    }
                }
            }

            let stamps = root
                .get(LEGACY_UNIQUE_USERS_KEY)
                .and_then(|u| u.get(verb.as_str()))
                .and_then(Value::as_array);
            if let Some(stamps) = stamps {
                for stamp in stamps {
                    match stamp.as_str() {
                        Some(s) => doc.stamps_mut(verb).push(UserStamp::from_raw(s)),
                        None => warn!(%verb, "Skipping non-string unique-user stamp in legacy document"),
                    }
                }
            }
        }

        for bucket in doc.method_buckets.values_mut() {
            for record in bucket.iter_mut() {
                record.timestamps.sort_unstable();
            }
        }

        Ok(doc)
    }
}
