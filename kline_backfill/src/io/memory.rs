use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::{
    io::sink::{DocumentSink, SinkError, UpsertOutcome},
    models::document::Document,
};

/// In-process store keyed by document id, in first-insert order.
///
/// Backs dry runs and tests. Replacing a document keeps its original position.
#[derive(Debug, Default)]
pub struct MemorySink {
    documents: Mutex<IndexMap<String, Document>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, Document>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of every stored document.
    pub fn documents(&self) -> Vec<Document> {
        self.lock().values().cloned().collect()
    }
}

#[async_trait]
impl DocumentSink for MemorySink {
    async fn upsert(&self, document: &Document) -> Result<UpsertOutcome, SinkError> {
        let previous = self.lock().insert(document.id.clone(), document.clone());
        Ok(match previous {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Created,
        })
    }
}
