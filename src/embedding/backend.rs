//! Model backend seam.
//!
//! [`EmbeddingBackend`] is the raw model interface: it returns un-normalized
//! model output and knows nothing about embedding spaces. The provider wraps
//! it to add truncation, normalization and icon filtering.

use std::path::Path;

use crate::error::EmbeddingResult;

/// Trait for the models behind an [`EmbeddingProvider`](super::EmbeddingProvider).
///
/// Implementations should be thread-safe. Each method returns one embedding
/// per input, in input order.
pub trait EmbeddingBackend: Send + Sync {
    /// Identifier of the text model.
    fn text_model_name(&self) -> &str;

    /// Identifier of the image model pair.
    fn image_model_name(&self) -> &str;

    /// Encode texts with the text model.
    fn embed_texts(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Encode texts with the image model's paired text encoder.
    ///
    /// Output lives in the image space and is comparable to [`embed_images`](Self::embed_images).
    fn embed_image_queries(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>>;

    /// Encode image files with the image model.
    fn embed_images(&self, paths: &[&Path]) -> EmbeddingResult<Vec<Vec<f32>>>;
}

/// Deterministic backend for unit tests.
///
/// Text vectors are byte histograms folded into `text_dim` bins; image
/// vectors carry the mean RGB of the decoded file. Both start from a 0.1
/// baseline so nothing normalizes from zero.
#[cfg(test)]
pub struct MockEmbeddingBackend {
    pub text_dim: usize,
    pub image_dim: usize,
    pub text_calls: std::sync::atomic::AtomicUsize,
    pub image_query_calls: std::sync::atomic::AtomicUsize,
    pub image_calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockEmbeddingBackend {
    pub fn new(text_dim: usize, image_dim: usize) -> Self {
        Self {
            text_dim,
            image_dim,
            text_calls: Default::default(),
            image_query_calls: Default::default(),
            image_calls: Default::default(),
        }
    }

    fn histogram(text: &str, dim: usize, salt: usize) -> Vec<f32> {
        let mut embedding = vec![0.1; dim];
        for (i, byte) in text.bytes().enumerate() {
            embedding[(byte as usize + i + salt) % dim] += 1.0;
        }
        embedding
    }
}

#[cfg(test)]
impl EmbeddingBackend for MockEmbeddingBackend {
    fn text_model_name(&self) -> &str {
        "mock-text"
    }

    fn image_model_name(&self) -> &str {
        "mock-image"
    }

    fn embed_texts(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        use std::sync::atomic::Ordering;
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| Self::histogram(t, self.text_dim, 0))
            .collect())
    }

    fn embed_image_queries(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        use std::sync::atomic::Ordering;
        self.image_query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| Self::histogram(t, self.image_dim, 7))
            .collect())
    }

    fn embed_images(&self, paths: &[&Path]) -> EmbeddingResult<Vec<Vec<f32>>> {
        use std::sync::atomic::Ordering;
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        paths
            .iter()
            .map(|path| {
                let img = image::open(path).map_err(|e| crate::error::EmbeddingError::ImageDecode {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })?;
                let rgb = img.to_rgb8();
                let pixels = (rgb.width() as f32 * rgb.height() as f32).max(1.0);
                let mut sums = [0.0f32; 3];
                for pixel in rgb.pixels() {
                    for (sum, channel) in sums.iter_mut().zip(pixel.0) {
                        *sum += channel as f32;
                    }
                }
                let mut embedding = vec![0.1; self.image_dim];
                for (slot, sum) in embedding.iter_mut().zip(sums) {
                    *slot += sum / pixels / 255.0;
                }
                Ok(embedding)
            })
            .collect()
    }
}
