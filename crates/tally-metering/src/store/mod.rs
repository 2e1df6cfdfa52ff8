//! Metrics document storage
//!
//! The core only ever loads and saves the whole document. Implementations
//! must make `save` atomic with respect to `load`: a reader sees either the
//! previous document or the new one, never a partial write.

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use tally_common::{MetricsDocument, Result};

/// Storage collaborator for the metrics document
#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Load the document, `None` if nothing has ever been saved
    async fn load(&self) -> Result<Option<MetricsDocument>>;

    /// Replace the persisted document
    async fn save(&self, doc: &MetricsDocument) -> Result<()>;
}
