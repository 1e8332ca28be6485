//! Embedding generation for case artifacts.
//!
//! Text artifacts are encoded by a sentence model; images by an image tower
//! whose paired text tower encodes natural-language queries into the same
//! space. The provider returns vectors typed by that space, so a query vector
//! can only be searched against the collection it was produced for.

mod backend;
pub mod icon;
mod model;
mod provider;

pub use backend::EmbeddingBackend;
#[cfg(test)]
pub use backend::MockEmbeddingBackend;
pub use icon::is_icon;
pub use model::{FastEmbedBackend, ImageModelId, TextModelId};
pub use provider::{
    DEFAULT_SNIPPET_CHARS, EmbedOutcome, EmbeddingProvider, ModelDimensions, QuerySpace,
    SkipReason, truncate_chars,
};

use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::error::EmbeddingResult;

/// Builds a provider over the fastembed models named in `config`.
///
/// Models are not loaded until first use.
pub fn provider_from_config(
    config: &EmbeddingConfig,
    snippet_chars: usize,
    icon_size_guard: bool,
) -> EmbeddingResult<EmbeddingProvider> {
    let backend = FastEmbedBackend::from_config(config)?;
    Ok(EmbeddingProvider::new(Arc::new(backend))
        .with_snippet_chars(snippet_chars)
        .with_icon_size_guard(icon_size_guard))
}
