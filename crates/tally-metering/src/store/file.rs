//! JSON file metrics store
//!
//! Persists the document as a single JSON file. Saves go to a temporary
//! sibling file which is then renamed over the target, so a concurrent load
//! reads either the old or the new document in full.
//!
//! Files without a `version` field are treated as the legacy untyped layout
//! and converted on load; the next save rewrites them in the current schema.

use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tally_common::{MetricsDocument, Result, TallyError, DOCUMENT_VERSION};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::MetricsStore;

/// Store backed by one JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "metrics".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<MetricsDocument> {
        let value: Value = serde_json::from_slice(bytes)?;

        match value.get("version").and_then(Value::as_u64) {
            Some(version) if version > u64::from(DOCUMENT_VERSION) => {
                Err(TallyError::Serialization(format!(
                    "unsupported metrics document version {} (max {})",
                    version, DOCUMENT_VERSION
                )))
            }
            Some(_) => Ok(serde_json::from_value(value)?),
            None => {
                info!(path = %self.path.display(), "Migrating legacy metrics document");
                MetricsDocument::from_legacy_json(&value)
            }
        }
    }
}

#[async_trait]
impl MetricsStore for JsonFileStore {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<MetricsDocument>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No metrics document on disk");
                return Ok(None);
            }
            Err(e) => {
                return Err(TallyError::Storage(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        self.decode(&bytes).map(Some)
    }

    #[instrument(skip(self, doc), fields(path = %self.path.display()))]
    async fn save(&self, doc: &MetricsDocument) -> Result<()> {
        let bytes = serde_json::to_vec(doc)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp = self.temp_path();
        if let Err(e) = tokio::fs::write(&temp, &bytes).await {
            return Err(TallyError::Storage(format!(
                "failed to write {}: {}",
                temp.display(),
                e
            )));
        }
        if let Err(e) = tokio::fs::rename(&temp, &self.path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(TallyError::Storage(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e
            )));
        }

        debug!(bytes = bytes.len(), "Saved metrics document");
        Ok(())
    }
}
