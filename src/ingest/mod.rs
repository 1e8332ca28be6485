//! Case ingestion: walk an artifact tree, embed each file in its own space
//! and insert the vectors into the case's two collections.
//!
//! A run is all-or-nothing at the collection level. When both collections
//! already exist the run inserts nothing; otherwise a leftover half of the
//! pair is dropped, both are created and the whole tree is embedded.
//! Per-file failures are logged and skipped.

mod batch;
pub mod walker;

pub use batch::{FlushStats, PendingBatch};
pub use walker::{ArtifactWalker, KindCounts};

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{IngestConfig, Settings};
use crate::display::file_progress;
use crate::embedding::{EmbedOutcome, EmbeddingProvider, SkipReason, truncate_chars};
use crate::error::{IngestError, IngestResult};
use crate::metadata::MetadataExtractor;
use crate::store::{CollectionSchema, StoreGateway};
use crate::types::{ArtifactKind, CaseCollections, Modality};
use crate::vector::{ImageSpace, TextSpace, VectorDimension};

/// Knobs for one ingest run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Pending records per collection that trigger an insert
    pub batch_size: usize,
    pub filter_icons: bool,
    pub show_progress: bool,
    /// Classify files without embedding or touching the store
    pub dry_run: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for IngestOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            filter_icons: config.filter_icons,
            show_progress: false,
            dry_run: false,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStatus {
    /// Both collections existed; nothing was inserted.
    AlreadyIndexed,
    Completed,
    DryRun,
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestStatus::AlreadyIndexed => f.write_str("already indexed"),
            IngestStatus::Completed => f.write_str("completed"),
            IngestStatus::DryRun => f.write_str("dry run"),
        }
    }
}

/// Counters for one ingest run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub status: IngestStatus,
    pub image_collection: String,
    pub text_collection: String,
    pub files_seen: usize,
    pub images_embedded: usize,
    pub texts_embedded: usize,
    pub icons_skipped: usize,
    pub unsupported_skipped: usize,
    /// Files that failed to read, decode, embed or describe
    pub failures: usize,
    pub insert_calls: usize,
    pub image_rows: u64,
    pub text_rows: u64,
    pub elapsed_ms: u128,
}

impl IngestReport {
    fn new(status: IngestStatus, collections: &CaseCollections) -> Self {
        Self {
            status,
            image_collection: collections.image.clone(),
            text_collection: collections.text.clone(),
            files_seen: 0,
            images_embedded: 0,
            texts_embedded: 0,
            icons_skipped: 0,
            unsupported_skipped: 0,
            failures: 0,
            insert_calls: 0,
            image_rows: 0,
            text_rows: 0,
            elapsed_ms: 0,
        }
    }

    fn absorb(&mut self, flushed: FlushStats) {
        self.failures += flushed.metadata_failures;
        self.insert_calls += flushed.insert_calls;
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ingest {}", self.status)?;
        writeln!(f, "  Files seen:        {}", self.files_seen)?;
        writeln!(f, "  Images embedded:   {}", self.images_embedded)?;
        writeln!(f, "  Texts embedded:    {}", self.texts_embedded)?;
        writeln!(f, "  Icons skipped:     {}", self.icons_skipped)?;
        writeln!(f, "  Unsupported files: {}", self.unsupported_skipped)?;
        writeln!(f, "  Failures:          {}", self.failures)?;
        writeln!(f, "  {}: {} rows", self.image_collection, self.image_rows)?;
        write!(f, "  {}: {} rows", self.text_collection, self.text_rows)
    }
}

/// Drives one case through embedding and insertion.
pub struct Ingestor<'a> {
    provider: &'a EmbeddingProvider,
    gateway: &'a StoreGateway,
    extractor: &'a dyn MetadataExtractor,
    case_name: String,
    collections: CaseCollections,
    options: IngestOptions,
    walker: ArtifactWalker,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        provider: &'a EmbeddingProvider,
        gateway: &'a StoreGateway,
        extractor: &'a dyn MetadataExtractor,
        case_name: &str,
    ) -> Self {
        Self {
            provider,
            gateway,
            extractor,
            case_name: case_name.to_string(),
            collections: CaseCollections::for_case(case_name),
            options: IngestOptions::default(),
            walker: ArtifactWalker::new(),
        }
    }

    /// Ingestor configured from `settings.ingest` for `settings.case_name`.
    pub fn from_settings(
        provider: &'a EmbeddingProvider,
        gateway: &'a StoreGateway,
        extractor: &'a dyn MetadataExtractor,
        settings: &Settings,
    ) -> Self {
        Self::new(provider, gateway, extractor, &settings.case_name)
            .with_options(IngestOptions::from(&settings.ingest))
    }

    #[must_use]
    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn collections(&self) -> &CaseCollections {
        &self.collections
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// True when both case collections already exist.
    pub fn would_skip(&self) -> IngestResult<bool> {
        Ok(self.gateway.has_collection(&self.collections.image)?
            && self.gateway.has_collection(&self.collections.text)?)
    }

    /// Ingests every file under `root`.
    pub fn ingest(&self, root: &Path) -> IngestResult<IngestReport> {
        let started = Instant::now();
        if self.options.batch_size == 0 {
            return Err(IngestError::Config {
                reason: "batch_size must be greater than 0".to_string(),
            });
        }

        let mut report = if self.options.dry_run {
            self.dry_run(root)?
        } else if self.would_skip()? {
            info!(
                image = %self.collections.image,
                text = %self.collections.text,
                "Collections already exist, skipping ingest"
            );
            let mut report = IngestReport::new(IngestStatus::AlreadyIndexed, &self.collections);
            self.fill_row_counts(&mut report)?;
            report
        } else {
            self.run(root)?
        };

        report.elapsed_ms = started.elapsed().as_millis();
        Ok(report)
    }

    fn dry_run(&self, root: &Path) -> IngestResult<IngestReport> {
        ensure_source(root)?;
        let counts = self.walker.classify_counts(root);
        let mut report = IngestReport::new(IngestStatus::DryRun, &self.collections);
        report.files_seen = counts.total();
        report.unsupported_skipped = counts.unsupported;
        info!(
            images = counts.images,
            texts = counts.texts,
            unsupported = counts.unsupported,
            "Dry run classified {} files",
            counts.total()
        );
        Ok(report)
    }

    fn run(&self, root: &Path) -> IngestResult<IngestReport> {
        ensure_source(root)?;

        let dims = self.provider.dimensions()?;
        self.drop_partial_collections()?;
        self.create_collections(dims.image, dims.text)?;

        let files: Vec<PathBuf> = self.walker.walk(root).collect();
        info!(root = %root.display(), files = files.len(), "Ingesting artifacts");

        let mut report = IngestReport::new(IngestStatus::Completed, &self.collections);
        let mut images = PendingBatch::<ImageSpace>::new(&self.collections.image);
        let mut texts = PendingBatch::<TextSpace>::new(&self.collections.text);

        let progress = file_progress(
            files.len() as u64,
            "Embedding & uploading",
            self.options.show_progress,
        );

        for path in files {
            report.files_seen += 1;
            match ArtifactKind::classify(&path) {
                ArtifactKind::Image => self.embed_image(path, &mut images, &mut report),
                ArtifactKind::Text => self.embed_text(path, &mut texts, &mut report),
                ArtifactKind::Unsupported => {
                    debug!(path = %path.display(), "Unsupported file type");
                    report.unsupported_skipped += 1;
                }
            }

            if images.len() >= self.options.batch_size {
                report.absorb(images.flush(self.gateway, self.extractor)?);
            }
            if texts.len() >= self.options.batch_size {
                report.absorb(texts.flush(self.gateway, self.extractor)?);
            }
            progress.inc(1);
        }

        report.absorb(images.flush(self.gateway, self.extractor)?);
        report.absorb(texts.flush(self.gateway, self.extractor)?);
        progress.finish_and_clear();

        self.gateway.flush(&self.collections.image)?;
        self.gateway.flush(&self.collections.text)?;
        self.fill_row_counts(&mut report)?;

        info!(
            image_rows = report.image_rows,
            text_rows = report.text_rows,
            failures = report.failures,
            "Ingest done"
        );
        Ok(report)
    }

    /// Drops whichever case collection survived an earlier aborted run.
    fn drop_partial_collections(&self) -> IngestResult<()> {
        for modality in [Modality::Image, Modality::Text] {
            let name = self.collections.name(modality);
            if self.gateway.has_collection(name)? {
                warn!(collection = name, "Dropping partial collection before re-embedding");
                self.gateway.drop_collection(name)?;
            }
        }
        Ok(())
    }

    fn create_collections(
        &self,
        image_dim: VectorDimension,
        text_dim: VectorDimension,
    ) -> IngestResult<()> {
        for (modality, dimension) in [(Modality::Image, image_dim), (Modality::Text, text_dim)] {
            let name = self.collections.name(modality);
            let schema = CollectionSchema::new(name, dimension).with_description(format!(
                "{} attachments for case {}",
                modality.as_str(),
                self.case_name
            ));
            self.gateway.create_collection_with_schema(schema)?;
            info!(collection = name, dimension = dimension.get(), "Created collection");
        }
        Ok(())
    }

    fn embed_image(
        &self,
        path: PathBuf,
        batch: &mut PendingBatch<ImageSpace>,
        report: &mut IngestReport,
    ) {
        match self.provider.embed_image(&path, self.options.filter_icons) {
            EmbedOutcome::Embedded(vector) => {
                batch.push(vector, path, String::new());
                report.images_embedded += 1;
            }
            EmbedOutcome::Skipped(SkipReason::Icon) => report.icons_skipped += 1,
            EmbedOutcome::Failed(_) => report.failures += 1,
        }
    }

    fn embed_text(
        &self,
        path: PathBuf,
        batch: &mut PendingBatch<TextSpace>,
        report: &mut IngestReport,
    ) {
        let full = match read_text_lossy(&path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), "Failed to read text file: {e}");
                report.failures += 1;
                return;
            }
        };

        let snippet = truncate_chars(&full, self.provider.snippet_chars()).to_string();
        match self.provider.embed_text(&snippet) {
            Ok(vector) => {
                batch.push(vector, path, snippet);
                report.texts_embedded += 1;
            }
            Err(e) => {
                warn!(path = %path.display(), "Failed to embed text: {e}");
                report.failures += 1;
            }
        }
    }

    fn fill_row_counts(&self, report: &mut IngestReport) -> IngestResult<()> {
        report.image_rows = self.gateway.row_count(&self.collections.image)?;
        report.text_rows = self.gateway.row_count(&self.collections.text)?;
        Ok(())
    }
}

fn ensure_source(root: &Path) -> IngestResult<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(IngestError::SourceMissing {
            path: root.to_path_buf(),
        })
    }
}

/// Reads a file as UTF-8, dropping undecodable bytes.
pub fn read_text_lossy(path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(decode_ignoring_invalid(&bytes))
}

/// Keeps every valid UTF-8 sequence and silently skips the rest.
fn decode_ignoring_invalid(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}
