use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::IngestResult;
use crate::metadata::MetadataExtractor;
use crate::store::{ArtifactRecord, StoreGateway};
use crate::vector::{EmbeddingSpace, EmbeddingVector};

struct PendingEntry<S> {
    vector: EmbeddingVector<S>,
    path: PathBuf,
    content: String,
}

/// Outcome of flushing one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub inserted: usize,
    pub metadata_failures: usize,
    pub insert_calls: usize,
}

/// Embedded artifacts waiting to be inserted into one collection.
///
/// The space parameter ties the batch to its collection: an image batch
/// only accepts image-space vectors.
pub struct PendingBatch<S> {
    collection: String,
    entries: Vec<PendingEntry<S>>,
}

impl<S: EmbeddingSpace> PendingBatch<S> {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, vector: EmbeddingVector<S>, path: PathBuf, content: String) {
        self.entries.push(PendingEntry {
            vector,
            path,
            content,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Attaches metadata, inserts and clears the batch.
    ///
    /// A file whose metadata cannot be extracted is dropped from the batch.
    /// Insert failures propagate and leave the batch cleared.
    pub fn flush(
        &mut self,
        gateway: &StoreGateway,
        extractor: &dyn MetadataExtractor,
    ) -> IngestResult<FlushStats> {
        let mut stats = FlushStats::default();
        if self.entries.is_empty() {
            return Ok(stats);
        }

        let mut records = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            match extractor.extract(&entry.path) {
                Ok(metadata) => records.push(ArtifactRecord::new(
                    entry.vector,
                    entry.path.to_string_lossy(),
                    entry.content,
                    metadata,
                )),
                Err(e) => {
                    warn!(path = %entry.path.display(), "Dropping artifact, metadata failed: {e}");
                    stats.metadata_failures += 1;
                }
            }
        }

        if records.is_empty() {
            return Ok(stats);
        }

        let count = records.len();
        gateway.insert(&self.collection, records)?;
        stats.inserted = count;
        stats.insert_calls = 1;
        debug!(collection = %self.collection, space = S::NAME, count, "Inserted batch");
        Ok(stats)
    }
}
