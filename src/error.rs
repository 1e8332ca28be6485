//! Error types for the artifact indexing system
//!
//! This module provides structured error types using thiserror. Every error
//! exposes a stable status code so callers crossing the library boundary
//! (agents, the CLI, JSON consumers) can branch on it without parsing text.

use std::path::PathBuf;

use serde_json::{Value, json};
use thiserror::Error;

use crate::vector::{Metric, VectorError};

/// Errors raised while loading models or producing embeddings
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Unknown {kind} model '{name}'. Supported: {supported}")]
    UnknownModel {
        kind: &'static str,
        name: String,
        supported: String,
    },

    #[error(
        "Embedding model '{model}' is unavailable: {reason}. Ensure you have internet connection for first-time model download"
    )]
    ModelUnavailable { model: String, reason: String },

    #[error("Inference with '{model}' failed: {reason}")]
    Inference { model: String, reason: String },

    #[error("Model '{model}' returned no embedding")]
    EmptyOutput { model: String },

    #[error("Failed to decode image '{path}': {reason}")]
    ImageDecode { path: PathBuf, reason: String },

    #[error(transparent)]
    Vector(#[from] VectorError),
}

impl EmbeddingError {
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::UnknownModel { .. } => "UNKNOWN_MODEL",
            Self::ModelUnavailable { .. } => "MODEL_UNAVAILABLE",
            Self::Inference { .. } => "INFERENCE_FAILED",
            Self::EmptyOutput { .. } => "EMPTY_EMBEDDING",
            Self::ImageDecode { .. } => "IMAGE_DECODE_ERROR",
            Self::Vector(_) => "INVALID_VECTOR",
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::UnknownModel { .. } => {
                vec!["Set embedding.text_model / embedding.image_model to a supported name"]
            }
            Self::ModelUnavailable { .. } => vec![
                "Check network access for the first model download",
                "Check embedding.cache_dir is writable",
            ],
            _ => vec![],
        }
    }
}

/// Errors raised by a metadata extractor for a single file
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to read attributes of '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Metadata extraction failed for '{path}': {reason}")]
    Extraction { path: PathBuf, reason: String },
}

/// Errors raised by the vector store and its gateway
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Vector store unavailable at '{uri}': {reason}")]
    Unavailable { uri: String, reason: String },

    #[error("Collection '{collection}' does not exist")]
    CollectionNotFound { collection: String },

    #[error("Collection '{collection}' already exists")]
    CollectionExists { collection: String },

    #[error("Dimension mismatch for collection '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        collection: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "Metric mismatch for collection '{collection}': collection uses {expected}, request asked for {requested}"
    )]
    MetricMismatch {
        collection: String,
        expected: Metric,
        requested: Metric,
    },

    #[error("Field '{field}' does not exist in collection '{collection}'")]
    UnknownField { collection: String, field: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Store I/O failed at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Store data at '{path}' appears to be corrupted: {reason}")]
    Corrupted { path: PathBuf, reason: String },
}

impl StoreError {
    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "STORE_UNAVAILABLE",
            Self::CollectionNotFound { .. } => "COLLECTION_NOT_FOUND",
            Self::CollectionExists { .. } => "COLLECTION_EXISTS",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::MetricMismatch { .. } => "METRIC_MISMATCH",
            Self::UnknownField { .. } => "UNKNOWN_FIELD",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::Io { .. } => "STORE_IO_ERROR",
            Self::Corrupted { .. } => "STORE_CORRUPTED",
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Unavailable { .. } => vec![
                "Check store.uri in .evidex/settings.toml (a directory path or memory://)",
                "Remote store schemes are not supported by this build",
            ],
            Self::CollectionNotFound { .. } => vec![
                "Run 'evidex ingest' to build the case collections",
                "Run 'evidex collections' to see what exists",
            ],
            Self::DimensionMismatch { .. } => vec![
                "The collection was built with a different embedding model",
                "Query image collections with the image model's text encoder",
            ],
            Self::Corrupted { .. } => vec![
                "Remove the collection directory and re-run 'evidex ingest'",
                "Check for disk errors or filesystem corruption",
            ],
            Self::Io { .. } => vec!["Check disk space and permissions in the store directory"],
            _ => vec![],
        }
    }
}

/// Errors that abort an ingestion run
///
/// Per-file problems never surface here; they are logged and counted in
/// the ingestion report instead.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Source directory '{path}' does not exist or is not a directory")]
    SourceMissing { path: PathBuf },

    #[error("Invalid ingestion configuration: {reason}")]
    Config { reason: String },

    #[error("Embedding provider failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector store failed: {0}")]
    Store(#[from] StoreError),
}

impl IngestError {
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::SourceMissing { .. } => "SOURCE_NOT_FOUND",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Embedding(e) => e.status_code(),
            Self::Store(e) => e.status_code(),
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::SourceMissing { .. } => vec![
                "Pass the artifact directory explicitly: evidex ingest <PATH>",
                "Check paths.base_dir and case_name in .evidex/settings.toml",
            ],
            Self::Config { .. } => vec!["Run 'evidex config' to inspect the effective settings"],
            Self::Embedding(e) => e.recovery_suggestions(),
            Self::Store(e) => e.recovery_suggestions(),
        }
    }
}

/// Errors returned by the retrieval façade
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Failed to convert query to vector: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error(
        "Cannot determine the embedding space of collection '{collection}'. Expected a name ending in __attachments_image or __attachments_text"
    )]
    UnknownCollectionSpace { collection: String },
}

impl RetrievalError {
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Embedding(e) => e.status_code(),
            Self::Store(e) => e.status_code(),
            Self::UnknownCollectionSpace { .. } => "UNKNOWN_COLLECTION_SPACE",
        }
    }

    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Embedding(e) => e.recovery_suggestions(),
            Self::Store(e) => e.recovery_suggestions(),
            Self::UnknownCollectionSpace { .. } => {
                vec!["Run 'evidex collections' to list searchable collections"]
            }
        }
    }

    /// Structured payload handed to callers that expect data, not a fault.
    pub fn to_payload(&self) -> Value {
        json!({
            "error": self.to_string(),
            "code": self.status_code(),
        })
    }
}

/// Result type alias for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for ingestion runs
pub type IngestResult<T> = Result<T, IngestError>;

/// Result type alias for retrieval operations
pub type RetrievalResult<T> = Result<T, RetrievalError>;
