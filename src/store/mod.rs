//! Vector store abstraction and the gateway that owns the connection.
//!
//! Collections hold [`ArtifactRecord`]s: a vector plus the scalar fields
//! `path`, `modality`, `content` and `metadata`. Inserts are buffered until
//! [`VectorStore::flush`]; only flushed rows are visible to search, query and
//! row counts.

mod gateway;
mod local;
mod segment;

pub use gateway::{StoreConnector, StoreGateway, open_store};
pub use local::LocalStore;
pub use segment::VectorSegment;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::StoreResult;
use crate::metadata::Metadata;
use crate::types::Modality;
use crate::vector::{EmbeddingSpace, EmbeddingVector, Metric, VectorDimension};

/// Name of the vector field every collection declares.
pub const DEFAULT_VECTOR_FIELD: &str = "vector";

/// Scalar fields a caller may request back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputField {
    Path,
    Modality,
    Content,
    Metadata,
}

impl OutputField {
    /// Fields returned when the caller does not choose.
    pub const DEFAULT: &'static [OutputField] =
        &[OutputField::Path, OutputField::Modality, OutputField::Metadata];

    pub const ALL: &'static [OutputField] = &[
        OutputField::Path,
        OutputField::Modality,
        OutputField::Content,
        OutputField::Metadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputField::Path => "path",
            OutputField::Modality => "modality",
            OutputField::Content => "content",
            OutputField::Metadata => "metadata",
        }
    }
}

impl fmt::Display for OutputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "path" => Ok(OutputField::Path),
            "modality" => Ok(OutputField::Modality),
            "content" => Ok(OutputField::Content),
            "metadata" => Ok(OutputField::Metadata),
            other => Err(format!(
                "Unknown output field '{other}'. Valid fields: path, modality, content, metadata"
            )),
        }
    }
}

/// One indexed artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub vector: Vec<f32>,
    pub path: String,
    pub modality: Modality,
    /// Leading text of the source; empty for images.
    pub content: String,
    pub metadata: Metadata,
}

impl ArtifactRecord {
    /// Builds a record whose modality follows the vector's space.
    pub fn new<S: EmbeddingSpace>(
        vector: EmbeddingVector<S>,
        path: impl Into<String>,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            vector: vector.into_inner(),
            path: path.into(),
            modality: S::MODALITY,
            content: content.into(),
            metadata,
        }
    }

    /// Value of a scalar field as JSON.
    pub fn field(&self, field: OutputField) -> Value {
        match field {
            OutputField::Path => Value::String(self.path.clone()),
            OutputField::Modality => Value::String(self.modality.as_str().to_string()),
            OutputField::Content => Value::String(self.content.clone()),
            OutputField::Metadata => serde_json::to_value(&self.metadata).unwrap_or(Value::Null),
        }
    }

    /// Text a pattern query matches against.
    pub fn field_text(&self, field: OutputField) -> std::borrow::Cow<'_, str> {
        use std::borrow::Cow;
        match field {
            OutputField::Path => Cow::Borrowed(&self.path),
            OutputField::Modality => Cow::Borrowed(self.modality.as_str()),
            OutputField::Content => Cow::Borrowed(&self.content),
            OutputField::Metadata => Cow::Owned(self.metadata.render()),
        }
    }

    /// Requested fields as a JSON object.
    pub fn project(&self, fields: &[OutputField]) -> Map<String, Value> {
        fields
            .iter()
            .map(|f| (f.as_str().to_string(), self.field(*f)))
            .collect()
    }
}

/// Schema a collection is created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub dimension: VectorDimension,
    #[serde(default)]
    pub metric: Metric,
    #[serde(default = "default_vector_field")]
    pub vector_field: String,
    /// Ids are assigned by the store
    #[serde(default = "default_true")]
    pub auto_id: bool,
    /// Records may carry fields beyond the declared ones
    #[serde(default = "default_true")]
    pub dynamic_fields: bool,
    #[serde(default)]
    pub description: String,
}

fn default_vector_field() -> String {
    DEFAULT_VECTOR_FIELD.to_string()
}

fn default_true() -> bool {
    true
}

impl CollectionSchema {
    /// Cosine, auto-id, dynamic-field schema.
    pub fn new(name: impl Into<String>, dimension: VectorDimension) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric: Metric::Cosine,
            vector_field: default_vector_field(),
            auto_id: true,
            dynamic_fields: true,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Read-only description of a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub schema: CollectionSchema,
    /// Flushed rows
    pub row_count: u64,
    /// Inserted but not yet flushed
    pub pending_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for CollectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Collection: {}", self.schema.name)?;
        if !self.schema.description.is_empty() {
            writeln!(f, "  Description: {}", self.schema.description)?;
        }
        writeln!(
            f,
            "  Vector field: {} (dim {}, {})",
            self.schema.vector_field, self.schema.dimension, self.schema.metric
        )?;
        writeln!(
            f,
            "  Fields: path, modality, content, metadata{}",
            if self.schema.dynamic_fields {
                " (dynamic)"
            } else {
                ""
            }
        )?;
        writeln!(f, "  Rows: {}", self.row_count)?;
        if self.pending_count > 0 {
            writeln!(f, "  Pending (unflushed): {}", self.pending_count)?;
        }
        write!(
            f,
            "  Created: {}  Updated: {}",
            self.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    }
}

/// Nearest-neighbour request.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub collection: String,
    pub vector: Vec<f32>,
    pub vector_field: String,
    pub limit: usize,
    pub output_fields: Vec<OutputField>,
    pub metric: Metric,
}

impl SearchRequest {
    pub fn new(collection: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            collection: collection.into(),
            vector,
            vector_field: DEFAULT_VECTOR_FIELD.to_string(),
            limit: 5,
            output_fields: OutputField::DEFAULT.to_vec(),
            metric: Metric::Cosine,
        }
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn output_fields(mut self, fields: &[OutputField]) -> Self {
        self.output_fields = fields.to_vec();
        self
    }

    #[must_use]
    pub fn metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    #[must_use]
    pub fn vector_field(mut self, field: impl Into<String>) -> Self {
        self.vector_field = field.into();
        self
    }
}

/// Substring filter over one scalar field.
#[derive(Debug, Clone)]
pub struct PatternQuery {
    pub collection: String,
    pub field: OutputField,
    /// Case-sensitive
    pub substring: String,
    pub limit: usize,
    pub output_fields: Vec<OutputField>,
}

impl PatternQuery {
    pub fn new(
        collection: impl Into<String>,
        field: OutputField,
        substring: impl Into<String>,
    ) -> Self {
        Self {
            collection: collection.into(),
            field,
            substring: substring.into(),
            limit: 5,
            output_fields: OutputField::DEFAULT.to_vec(),
        }
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn output_fields(mut self, fields: &[OutputField]) -> Self {
        self.output_fields = fields.to_vec();
        self
    }
}

/// A result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub id: u64,
    /// Similarity (or distance for L2); absent for pattern queries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Hit {
    pub fn path(&self) -> Option<&str> {
        self.fields.get("path").and_then(Value::as_str)
    }
}

/// Operations every vector store backend provides.
///
/// Backends must report a missing collection as
/// [`StoreError::CollectionNotFound`](crate::error::StoreError::CollectionNotFound)
/// from every per-collection operation.
pub trait VectorStore: Send + Sync {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    fn list_collections(&self) -> StoreResult<Vec<String>>;

    fn has_collection(&self, name: &str) -> StoreResult<bool>;

    /// Fails with `CollectionExists` if the name is taken.
    fn create_collection(&self, schema: CollectionSchema) -> StoreResult<()>;

    fn drop_collection(&self, name: &str) -> StoreResult<()>;

    fn describe_collection(&self, name: &str) -> StoreResult<CollectionInfo>;

    /// Appends records and returns their assigned ids.
    fn insert(&self, name: &str, records: Vec<ArtifactRecord>) -> StoreResult<Vec<u64>>;

    /// Makes buffered inserts durable and visible.
    fn flush(&self, name: &str) -> StoreResult<()>;

    fn row_count(&self, name: &str) -> StoreResult<u64>;

    fn search(&self, request: &SearchRequest) -> StoreResult<Vec<Hit>>;

    fn query(&self, query: &PatternQuery) -> StoreResult<Vec<Hit>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{ImageSpace, TextSpace};

    #[test]
    fn test_record_modality_follows_space() {
        let v = EmbeddingVector::<ImageSpace>::normalized(vec![1.0, 1.0]).unwrap();
        let record = ArtifactRecord::new(v, "a.png", "", Metadata::new());
        assert_eq!(record.modality, Modality::Image);

        let v = EmbeddingVector::<TextSpace>::normalized(vec![1.0, 0.0]).unwrap();
        let record = ArtifactRecord::new(v, "a.txt", "hello", Metadata::new());
        assert_eq!(record.modality, Modality::Text);
        assert_eq!(record.field_text(OutputField::Content), "hello");
    }

    #[test]
    fn test_projection_and_hit_serialization() {
        let metadata: Metadata = [("File:FileSize", "12")].into_iter().collect();
        let v = EmbeddingVector::<TextSpace>::normalized(vec![0.0, 2.0]).unwrap();
        let record = ArtifactRecord::new(v, "notes.txt", "meet at 9", metadata);

        let hit = Hit {
            id: 4,
            score: Some(0.5),
            fields: record.project(OutputField::DEFAULT),
        };
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["id"], 4);
        assert_eq!(json["path"], "notes.txt");
        assert_eq!(json["modality"], "text");
        assert_eq!(json["metadata"]["File:FileSize"], "12");
        assert!(json.get("content").is_none());
        assert_eq!(hit.path(), Some("notes.txt"));
    }

    #[test]
    fn test_output_field_parsing() {
        assert_eq!("Path".parse::<OutputField>().unwrap(), OutputField::Path);
        assert!("vector".parse::<OutputField>().is_err());
    }
}
