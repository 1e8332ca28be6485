//! Typed embedding provider.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::embedding::EmbeddingBackend;
use crate::embedding::icon::is_icon;
use crate::error::{EmbeddingError, EmbeddingResult};
use crate::vector::{EmbeddingSpace, EmbeddingVector, ImageSpace, TextSpace, VectorDimension};

/// Default number of characters embedded from a text artifact.
pub const DEFAULT_SNIPPET_CHARS: usize = 500;

const DIMENSION_PROBE: &str = "dimension probe";

/// Why an input produced no vector without being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Rejected by the icon heuristic.
    Icon,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Icon => f.write_str("icon"),
        }
    }
}

/// Result of embedding one image file.
#[derive(Debug)]
pub enum EmbedOutcome<S: EmbeddingSpace> {
    Embedded(EmbeddingVector<S>),
    Skipped(SkipReason),
    Failed(EmbeddingError),
}

impl<S: EmbeddingSpace> EmbedOutcome<S> {
    pub fn is_embedded(&self) -> bool {
        matches!(self, EmbedOutcome::Embedded(_))
    }
}

/// Dimensions reported by the loaded models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDimensions {
    pub text: VectorDimension,
    pub image: VectorDimension,
}

/// Turns text and images into unit-length vectors in their own spaces.
///
/// Owns a backend and caches the dimensions probed from it. Text is cut to
/// `snippet_chars` characters before encoding.
pub struct EmbeddingProvider {
    backend: Arc<dyn EmbeddingBackend>,
    snippet_chars: usize,
    icon_size_guard: bool,
    dimensions: Mutex<Option<ModelDimensions>>,
}

impl EmbeddingProvider {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            backend,
            snippet_chars: DEFAULT_SNIPPET_CHARS,
            icon_size_guard: false,
            dimensions: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn with_snippet_chars(mut self, chars: usize) -> Self {
        self.snippet_chars = chars.max(1);
        self
    }

    /// Pass the on-disk size to the icon heuristic.
    #[must_use]
    pub fn with_icon_size_guard(mut self, enabled: bool) -> Self {
        self.icon_size_guard = enabled;
        self
    }

    pub fn snippet_chars(&self) -> usize {
        self.snippet_chars
    }

    pub fn backend(&self) -> &Arc<dyn EmbeddingBackend> {
        &self.backend
    }

    /// Embeds the first `snippet_chars` characters of `text` with the text model.
    pub fn embed_text(&self, text: &str) -> EmbeddingResult<EmbeddingVector<TextSpace>> {
        let snippet = truncate_chars(text, self.snippet_chars);
        let raw = first(
            self.backend.embed_texts(&[snippet])?,
            self.backend.text_model_name(),
        )?;
        self.finish(raw)
    }

    /// Embeds `query` with the image model's text encoder.
    pub fn embed_query_for_image_space(
        &self,
        query: &str,
    ) -> EmbeddingResult<EmbeddingVector<ImageSpace>> {
        let raw = first(
            self.backend.embed_image_queries(&[query])?,
            self.backend.image_model_name(),
        )?;
        self.finish(raw)
    }

    /// Embeds an image file, optionally rejecting UI icons.
    ///
    /// Never returns an error: decode and inference failures come back as
    /// [`EmbedOutcome::Failed`] after being logged.
    pub fn embed_image(&self, path: &Path, filter_icons: bool) -> EmbedOutcome<ImageSpace> {
        match self.try_embed_image(path, filter_icons) {
            Ok(Some(vector)) => EmbedOutcome::Embedded(vector),
            Ok(None) => {
                debug!(path = %path.display(), "Skipping icon");
                EmbedOutcome::Skipped(SkipReason::Icon)
            }
            Err(e) => {
                warn!(path = %path.display(), code = e.status_code(), "Image not embedded: {e}");
                EmbedOutcome::Failed(e)
            }
        }
    }

    fn try_embed_image(
        &self,
        path: &Path,
        filter_icons: bool,
    ) -> EmbeddingResult<Option<EmbeddingVector<ImageSpace>>> {
        let decode_error = |reason: String| EmbeddingError::ImageDecode {
            path: path.to_path_buf(),
            reason,
        };

        let image = image::ImageReader::open(path)
            .map_err(|e| decode_error(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| decode_error(e.to_string()))?
            .decode()
            .map_err(|e| decode_error(e.to_string()))?;
        let rgb = image::DynamicImage::ImageRgb8(image.to_rgb8());

        if filter_icons {
            let size_hint = if self.icon_size_guard {
                std::fs::metadata(path).ok().map(|m| m.len())
            } else {
                None
            };
            if is_icon(&rgb, size_hint) {
                return Ok(None);
            }
        }

        let raw = first(
            self.backend.embed_images(&[path])?,
            self.backend.image_model_name(),
        )?;
        self.finish(raw).map(Some)
    }

    /// Text and image dimensions, probed once from the models.
    ///
    /// The image dimension is read from the image model's text encoder,
    /// which shares the image tower's output space.
    pub fn dimensions(&self) -> EmbeddingResult<ModelDimensions> {
        let mut cached = self.dimensions.lock();
        if let Some(dims) = *cached {
            return Ok(dims);
        }

        let text = first(
            self.backend.embed_texts(&[DIMENSION_PROBE])?,
            self.backend.text_model_name(),
        )?;
        let image = first(
            self.backend.embed_image_queries(&[DIMENSION_PROBE])?,
            self.backend.image_model_name(),
        )?;
        let dims = ModelDimensions {
            text: VectorDimension::new(text.len())?,
            image: VectorDimension::new(image.len())?,
        };
        debug!(text = %dims.text, image = %dims.image, "Probed embedding dimensions");
        *cached = Some(dims);
        Ok(dims)
    }

    /// Normalizes and, once dimensions are known, checks the length.
    fn finish<S: EmbeddingSpace>(&self, raw: Vec<f32>) -> EmbeddingResult<EmbeddingVector<S>> {
        if let Some(dims) = *self.dimensions.lock() {
            let expected = match S::MODALITY {
                crate::types::Modality::Text => dims.text,
                crate::types::Modality::Image => dims.image,
            };
            expected.validate_vector(&raw)?;
        }
        Ok(EmbeddingVector::normalized(raw)?)
    }
}

fn first(mut batch: Vec<Vec<f32>>, model: &str) -> EmbeddingResult<Vec<f32>> {
    if batch.is_empty() {
        return Err(EmbeddingError::EmptyOutput {
            model: model.to_string(),
        });
    }
    Ok(batch.swap_remove(0))
}

/// Longest prefix of `text` holding at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Chooses the encoder for queries against a collection in this space.
pub trait QuerySpace: EmbeddingSpace + Sized {
    fn encode_query(
        provider: &EmbeddingProvider,
        query: &str,
    ) -> EmbeddingResult<EmbeddingVector<Self>>;
}

impl QuerySpace for TextSpace {
    fn encode_query(
        provider: &EmbeddingProvider,
        query: &str,
    ) -> EmbeddingResult<EmbeddingVector<Self>> {
        provider.embed_text(query)
    }
}

impl QuerySpace for ImageSpace {
    fn encode_query(
        provider: &EmbeddingProvider,
        query: &str,
    ) -> EmbeddingResult<EmbeddingVector<Self>> {
        provider.embed_query_for_image_space(query)
    }
}
