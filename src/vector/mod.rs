//! Vector primitives: typed embedding vectors, dimensions, metrics and
//! similarity kernels.
//!
//! Every vector that reaches a collection is built through
//! [`EmbeddingVector::normalized`], which fixes its embedding space at the
//! type level and guarantees unit length.

mod similarity;
mod types;

pub use similarity::{cosine_similarity, dot, l2_distance, l2_norm, score};
pub use types::{
    EmbeddingSpace, EmbeddingVector, ImageSpace, Metric, TextSpace, UNIT_NORM_TOLERANCE,
    VectorDimension, VectorError,
};
