//! Type-safe wrappers and core types for embedding vectors.
//!
//! Vectors carry their embedding space as a type parameter. A text-space
//! vector and an image-space vector may have the same length, but they are
//! not comparable, and the type system keeps them apart.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Modality;
use crate::vector::similarity::l2_norm;

/// Tolerance used when checking that a vector has unit length.
pub const UNIT_NORM_TOLERANCE: f32 = 1e-5;

/// Type-safe wrapper for vector dimensions.
///
/// Ensures runtime validation of vector dimensions to prevent
/// dimension mismatches between a vector and its collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct VectorDimension(usize);

impl VectorDimension {
    /// Creates a new `VectorDimension` with validation.
    ///
    /// Returns an error if the dimension is zero.
    pub fn new(dim: usize) -> Result<Self, VectorError> {
        if dim == 0 {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Vector dimension cannot be zero",
            });
        }
        Ok(Self(dim))
    }

    /// Returns the underlying dimension value.
    #[must_use]
    pub const fn get(&self) -> usize {
        self.0
    }

    /// Validates that a vector has the expected dimension.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl TryFrom<usize> for VectorDimension {
    type Error = VectorError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VectorDimension> for usize {
    fn from(value: VectorDimension) -> Self {
        value.0
    }
}

impl fmt::Display for VectorDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Similarity metric declared on a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Metric {
    /// Cosine similarity, higher is closer.
    #[default]
    #[serde(rename = "COSINE")]
    Cosine,
    /// Inner product, higher is closer.
    #[serde(rename = "IP")]
    InnerProduct,
    /// Euclidean distance, lower is closer.
    #[serde(rename = "L2")]
    L2,
}

impl Metric {
    /// Stable upper-case name, as written in collection schemas.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "COSINE",
            Metric::InnerProduct => "IP",
            Metric::L2 => "L2",
        }
    }

    /// Whether a larger score means a closer match.
    #[must_use]
    pub fn higher_is_closer(&self) -> bool {
        !matches!(self, Metric::L2)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "COSINE" => Ok(Metric::Cosine),
            "IP" | "INNER_PRODUCT" => Ok(Metric::InnerProduct),
            "L2" | "EUCLIDEAN" => Ok(Metric::L2),
            other => Err(VectorError::UnknownMetric(other.to_string())),
        }
    }
}

/// Marker trait for an embedding space.
pub trait EmbeddingSpace: Send + Sync + 'static {
    /// Modality of the records whose vectors live in this space.
    const MODALITY: Modality;
    /// Human-readable space name for logs and errors.
    const NAME: &'static str;
}

/// Space produced by the text model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpace;

/// Space produced by the image model and its paired text encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSpace;

impl EmbeddingSpace for TextSpace {
    const MODALITY: Modality = Modality::Text;
    const NAME: &'static str = "text";
}

impl EmbeddingSpace for ImageSpace {
    const MODALITY: Modality = Modality::Image;
    const NAME: &'static str = "image";
}

/// L2-normalized embedding in space `S`.
///
/// The only way to build one is [`EmbeddingVector::normalized`], so every
/// value of this type has unit norm.
#[derive(Clone, PartialEq)]
pub struct EmbeddingVector<S> {
    values: Vec<f32>,
    _space: PhantomData<S>,
}

impl<S: EmbeddingSpace> EmbeddingVector<S> {
    /// Normalizes raw model output to unit length.
    ///
    /// Fails on empty, all-zero or non-finite input.
    pub fn normalized(mut values: Vec<f32>) -> Result<Self, VectorError> {
        if values.is_empty() {
            return Err(VectorError::InvalidDimension {
                dimension: 0,
                reason: "Embedding output is empty",
            });
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(VectorError::NonFinite);
        }
        let norm = l2_norm(&values);
        if norm == 0.0 {
            return Err(VectorError::ZeroNorm);
        }
        for v in &mut values {
            *v /= norm;
        }
        Ok(Self {
            values,
            _space: PhantomData,
        })
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn norm(&self) -> f32 {
        l2_norm(&self.values)
    }

    /// Modality of the space this vector belongs to.
    #[must_use]
    pub fn modality(&self) -> Modality {
        S::MODALITY
    }

    #[must_use]
    pub fn into_inner(self) -> Vec<f32> {
        self.values
    }
}

impl<S: EmbeddingSpace> fmt::Debug for EmbeddingVector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingVector")
            .field("space", &S::NAME)
            .field("len", &self.values.len())
            .finish()
    }
}

/// Errors that can occur during vector operations.
///
/// All error messages include actionable suggestions for resolution.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error(
        "Vector dimension mismatch: expected {expected}, got {actual}\nSuggestion: Ensure all vectors use the same embedding model"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid vector dimension: {dimension}\nReason: {reason}")]
    InvalidDimension {
        dimension: usize,
        reason: &'static str,
    },

    #[error("Cannot normalize a zero-length vector\nSuggestion: Check the embedding model output")]
    ZeroNorm,

    #[error("Vector contains NaN or infinite values\nSuggestion: Check the embedding model output")]
    NonFinite,

    #[error("Unknown similarity metric '{0}'\nSuggestion: Use one of COSINE, IP, L2")]
    UnknownMetric(String),
}
