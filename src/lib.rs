//! Multimodal indexing and retrieval of case artifacts.
//!
//! Images and text files found under a case's attachment directory are
//! embedded into two separate vector spaces and stored in a pair of
//! collections. Natural-language queries are encoded in the space of the
//! collection they target.

pub mod config;
pub mod display;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod io;
pub mod logging;
pub mod metadata;
pub mod retrieve;
pub mod store;
pub mod types;
pub mod vector;

// Explicit exports for better API clarity
pub use config::Settings;
pub use embedding::{
    EmbedOutcome, EmbeddingBackend, EmbeddingProvider, FastEmbedBackend, QuerySpace, SkipReason,
};
pub use error::{
    EmbeddingError, EmbeddingResult, IngestError, IngestResult, MetadataError, RetrievalError,
    RetrievalResult, StoreError, StoreResult,
};
pub use ingest::{IngestOptions, IngestReport, IngestStatus, Ingestor};
pub use metadata::{FileAttributesExtractor, Metadata, MetadataExtractor};
pub use retrieve::{CollectionSummary, Retriever};
pub use store::{
    ArtifactRecord, CollectionInfo, CollectionSchema, Hit, LocalStore, OutputField, StoreGateway,
    VectorStore,
};
pub use types::{ArtifactKind, CaseCollections, Modality};
pub use vector::{EmbeddingVector, ImageSpace, Metric, TextSpace, VectorDimension};
