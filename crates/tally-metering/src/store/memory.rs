//! In-memory metrics store

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tally_common::{MetricsDocument, Result};

use super::MetricsStore;

/// Process-local store
///
/// The document is swapped whole under a lock, so readers never observe a
/// half-applied save.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    document: RwLock<Option<MetricsDocument>>,
    saves: AtomicU64,
}

impl InMemoryStore {
    /// Create an empty store (no document persisted yet)
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding an existing document
    pub fn with_document(doc: MetricsDocument) -> Self {
        Self {
            document: RwLock::new(Some(doc)),
            saves: AtomicU64::new(0),
        }
    }

    /// Copy of the current document
    pub fn snapshot(&self) -> Option<MetricsDocument> {
        self.document.read().clone()
    }

    /// Number of completed saves
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MetricsStore for InMemoryStore {
    async fn load(&self) -> Result<Option<MetricsDocument>> {
        Ok(self.snapshot())
    }

    async fn save(&self, doc: &MetricsDocument) -> Result<()> {
        *self.document.write() = Some(doc.clone());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
