//! Gateway configuration

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use tally_common::{AuthorizationGate, Result, TallyError};
use tally_metering::{RecorderConfig, UserMatching};

/// Config file read when `TALLY_CONFIG` is unset (extension optional)
pub const DEFAULT_CONFIG_FILE: &str = "tally";

/// Prefix of environment overrides, e.g. `TALLY_PORT`
pub const ENV_PREFIX: &str = "TALLY";

/// Report keys as `key=label,key2=label2`, replacing any `auth_keys` in the file
pub const AUTH_KEYS_ENV: &str = "TALLY_AUTH_KEYS";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// One authorized report key
///
/// Keys are listed as entries rather than a table because the config loader
/// lowercases table keys. The label is recorded as the caller's user id and
/// must not be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthKeyEntry {
    pub key: String,
    pub label: String,
}

/// Gateway service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Service host
    pub host: String,
    /// Service port
    pub port: u16,
    /// Metrics document file; in-memory only when unset
    pub metrics_path: Option<PathBuf>,
    /// Log output format
    pub log_format: LogFormat,
    /// Unique-user matching rule
    pub user_matching: UserMatching,
    /// Keys allowed to read the usage report
    #[serde(deserialize_with = "deserialize_auth_keys")]
    pub auth_keys: Vec<AuthKeyEntry>,
}

/// `auth_keys` as written in a file (entry list) or the environment (pair string)
#[derive(Deserialize)]
#[serde(untagged)]
enum AuthKeysSource {
    Entries(Vec<AuthKeyEntry>),
    Pairs(String),
}

fn deserialize_auth_keys<'de, D>(deserializer: D) -> std::result::Result<Vec<AuthKeyEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    match AuthKeysSource::deserialize(deserializer)? {
        AuthKeysSource::Entries(entries) => Ok(entries),
        AuthKeysSource::Pairs(list) => parse_key_list(&list).map_err(serde::de::Error::custom),
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            metrics_path: None,
            log_format: LogFormat::default(),
            user_matching: UserMatching::default(),
            auth_keys: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from `.env`, the config file, and the environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        let file = std::env::var("TALLY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let mut cfg = Self::from_sources(&file, ENV_PREFIX)?;

        // Platform-assigned PORT takes priority
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse::<u16>() {
                cfg.port = p;
            }
        }

        Ok(cfg)
    }

    /// Layer an optional config file under `<env_prefix>_*` environment variables
    pub fn from_sources(file: &str, env_prefix: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(file).required(false))
            .add_source(
                config::Environment::with_prefix(env_prefix).try_parsing(true),
            )
            .build()
            .map_err(|e| TallyError::Config(format!("failed to read configuration: {}", e)))?;

        let cfg: Self = settings
            .try_deserialize()
            .map_err(|e| TallyError::Config(format!("invalid configuration: {}", e)))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject report keys that cannot be used
    pub fn validate(&self) -> Result<()> {
        for entry in &self.auth_keys {
            if entry.key.is_empty() {
                return Err(TallyError::Config("auth key cannot be empty".into()));
            }
            if entry.label.is_empty() {
                return Err(TallyError::Config(format!(
                    "auth key {:?} has an empty label",
                    entry.key
                )));
            }
        }
        Ok(())
    }

    /// Socket address string to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn recorder(&self) -> RecorderConfig {
        RecorderConfig {
            user_matching: self.user_matching,
        }
    }

    /// Authorization gate over the configured keys
    pub fn authorization_gate(&self) -> AuthorizationGate {
        let keys: HashMap<String, String> = self
            .auth_keys
            .iter()
            .map(|entry| (entry.key.clone(), entry.label.clone()))
            .collect();
        AuthorizationGate::new(keys)
    }
}

/// Parse `key=label` pairs separated by commas
pub fn parse_key_list(list: &str) -> Result<Vec<AuthKeyEntry>> {
    list.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, label)) if !key.trim().is_empty() && !label.trim().is_empty() => {
                Ok(AuthKeyEntry {
                    key: key.trim().to_string(),
                    label: label.trim().to_string(),
                })
            }
            _ => Err(TallyError::Config(format!(
                "{} entries must be key=label, got {:?}",
                AUTH_KEYS_ENV, pair
            ))),
        })
        .collect()
}
