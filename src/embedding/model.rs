//! fastembed-backed models.
//!
//! Three ONNX models sit behind [`FastEmbedBackend`]: the text model, the
//! image tower and the image model's text tower. Each loads on first use and
//! stays cached for the backend's lifetime. A failed load leaves its slot
//! empty, so the next call retries instead of panicking.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::EmbeddingConfig;
use crate::embedding::EmbeddingBackend;
use crate::error::{EmbeddingError, EmbeddingResult};

/// Text models accepted in `embedding.text_model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextModelId {
    AllMiniLML6V2,
    AllMiniLML12V2,
    BGESmallENV15,
    BGEBaseENV15,
    NomicEmbedTextV15,
    MultilingualE5Small,
    ParaphraseMLMiniLML12V2,
}

impl TextModelId {
    pub const ALL: &'static [TextModelId] = &[
        TextModelId::AllMiniLML6V2,
        TextModelId::AllMiniLML12V2,
        TextModelId::BGESmallENV15,
        TextModelId::BGEBaseENV15,
        TextModelId::NomicEmbedTextV15,
        TextModelId::MultilingualE5Small,
        TextModelId::ParaphraseMLMiniLML12V2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TextModelId::AllMiniLML6V2 => "AllMiniLML6V2",
            TextModelId::AllMiniLML12V2 => "AllMiniLML12V2",
            TextModelId::BGESmallENV15 => "BGESmallENV15",
            TextModelId::BGEBaseENV15 => "BGEBaseENV15",
            TextModelId::NomicEmbedTextV15 => "NomicEmbedTextV15",
            TextModelId::MultilingualE5Small => "MultilingualE5Small",
            TextModelId::ParaphraseMLMiniLML12V2 => "ParaphraseMLMiniLML12V2",
        }
    }

    fn fastembed_model(&self) -> EmbeddingModel {
        match self {
            TextModelId::AllMiniLML6V2 => EmbeddingModel::AllMiniLML6V2,
            TextModelId::AllMiniLML12V2 => EmbeddingModel::AllMiniLML12V2,
            TextModelId::BGESmallENV15 => EmbeddingModel::BGESmallENV15,
            TextModelId::BGEBaseENV15 => EmbeddingModel::BGEBaseENV15,
            TextModelId::NomicEmbedTextV15 => EmbeddingModel::NomicEmbedTextV15,
            TextModelId::MultilingualE5Small => EmbeddingModel::MultilingualE5Small,
            TextModelId::ParaphraseMLMiniLML12V2 => EmbeddingModel::ParaphraseMLMiniLML12V2,
        }
    }
}

impl fmt::Display for TextModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TextModelId {
    type Err = EmbeddingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EmbeddingError::UnknownModel {
                kind: "text",
                name: s.to_string(),
                supported: join_names(Self::ALL.iter().map(TextModelId::as_str)),
            })
    }
}

/// Image model pairs accepted in `embedding.image_model`.
///
/// Each pair is an image tower plus the text tower trained into the same space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageModelId {
    ClipVitB32,
    NomicEmbedVisionV15,
}

impl ImageModelId {
    pub const ALL: &'static [ImageModelId] =
        &[ImageModelId::ClipVitB32, ImageModelId::NomicEmbedVisionV15];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageModelId::ClipVitB32 => "ClipVitB32",
            ImageModelId::NomicEmbedVisionV15 => "NomicEmbedVisionV15",
        }
    }

    fn image_tower(&self) -> ImageEmbeddingModel {
        match self {
            ImageModelId::ClipVitB32 => ImageEmbeddingModel::ClipVitB32,
            ImageModelId::NomicEmbedVisionV15 => ImageEmbeddingModel::NomicEmbedVisionV15,
        }
    }

    fn text_tower(&self) -> EmbeddingModel {
        match self {
            ImageModelId::ClipVitB32 => EmbeddingModel::ClipVitB32,
            ImageModelId::NomicEmbedVisionV15 => EmbeddingModel::NomicEmbedTextV15,
        }
    }
}

impl fmt::Display for ImageModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageModelId {
    type Err = EmbeddingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|id| id.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EmbeddingError::UnknownModel {
                kind: "image",
                name: s.to_string(),
                supported: join_names(Self::ALL.iter().map(ImageModelId::as_str)),
            })
    }
}

fn join_names<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

/// Production backend over fastembed's ONNX runtime models.
pub struct FastEmbedBackend {
    text_id: TextModelId,
    image_id: ImageModelId,
    cache_dir: PathBuf,
    show_download_progress: bool,
    text_model: Mutex<Option<TextEmbedding>>,
    image_text_model: Mutex<Option<TextEmbedding>>,
    image_model: Mutex<Option<ImageEmbedding>>,
}

impl FastEmbedBackend {
    /// Creates a backend without loading anything.
    pub fn new(text_id: TextModelId, image_id: ImageModelId, cache_dir: PathBuf) -> Self {
        Self {
            text_id,
            image_id,
            cache_dir,
            show_download_progress: false,
            text_model: Mutex::new(None),
            image_text_model: Mutex::new(None),
            image_model: Mutex::new(None),
        }
    }

    /// Builds a backend from configuration.
    ///
    /// # Errors
    /// Returns [`EmbeddingError::UnknownModel`] for unrecognized identifiers.
    pub fn from_config(config: &EmbeddingConfig) -> EmbeddingResult<Self> {
        let text_id = config.text_model.parse::<TextModelId>()?;
        let image_id = config.image_model.parse::<ImageModelId>()?;
        Ok(Self::new(text_id, image_id, config.resolved_cache_dir())
            .with_download_progress(config.show_download_progress))
    }

    #[must_use]
    pub fn with_download_progress(mut self, show: bool) -> Self {
        self.show_download_progress = show;
        self
    }

    fn load_text(&self, model: EmbeddingModel, name: &str) -> EmbeddingResult<TextEmbedding> {
        info!(model = name, cache = %self.cache_dir.display(), "Loading text encoder");
        TextEmbedding::try_new(
            InitOptions::new(model)
                .with_cache_dir(self.cache_dir.clone())
                .with_show_download_progress(self.show_download_progress),
        )
        .map_err(|e| {
            warn!(model = name, "Text encoder failed to load: {e}");
            EmbeddingError::ModelUnavailable {
                model: name.to_string(),
                reason: e.to_string(),
            }
        })
    }

    fn run_text(
        &self,
        slot: &Mutex<Option<TextEmbedding>>,
        model: EmbeddingModel,
        name: &str,
        texts: &[&str],
    ) -> EmbeddingResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut guard = slot.lock();
        if guard.is_none() {
            *guard = Some(self.load_text(model, name)?);
        }
        let Some(encoder) = guard.as_mut() else {
            return Err(EmbeddingError::ModelUnavailable {
                model: name.to_string(),
                reason: "model slot is empty".to_string(),
            });
        };

        // fastembed expects owned strings
        let owned: Vec<String> = texts.iter().map(|&s| s.to_string()).collect();
        encoder
            .embed(owned, None)
            .map_err(|e| EmbeddingError::Inference {
                model: name.to_string(),
                reason: e.to_string(),
            })
    }
}

impl EmbeddingBackend for FastEmbedBackend {
    fn text_model_name(&self) -> &str {
        self.text_id.as_str()
    }

    fn image_model_name(&self) -> &str {
        self.image_id.as_str()
    }

    fn embed_texts(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        self.run_text(
            &self.text_model,
            self.text_id.fastembed_model(),
            self.text_id.as_str(),
            texts,
        )
    }

    fn embed_image_queries(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        self.run_text(
            &self.image_text_model,
            self.image_id.text_tower(),
            self.image_id.as_str(),
            texts,
        )
    }

    fn embed_images(&self, paths: &[&Path]) -> EmbeddingResult<Vec<Vec<f32>>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let name = self.image_id.as_str();
        let mut guard = self.image_model.lock();
        if guard.is_none() {
            info!(model = name, cache = %self.cache_dir.display(), "Loading image encoder");
            let loaded = ImageEmbedding::try_new(
                ImageInitOptions::new(self.image_id.image_tower())
                    .with_cache_dir(self.cache_dir.clone())
                    .with_show_download_progress(self.show_download_progress),
            )
            .map_err(|e| {
                warn!(model = name, "Image encoder failed to load: {e}");
                EmbeddingError::ModelUnavailable {
                    model: name.to_string(),
                    reason: e.to_string(),
                }
            })?;
            *guard = Some(loaded);
        }
        let Some(encoder) = guard.as_mut() else {
            return Err(EmbeddingError::ModelUnavailable {
                model: name.to_string(),
                reason: "model slot is empty".to_string(),
            });
        };

        debug!(model = name, count = paths.len(), "Encoding images");
        let owned: Vec<PathBuf> = paths.iter().map(|p| p.to_path_buf()).collect();
        encoder
            .embed(owned, None)
            .map_err(|e| EmbeddingError::Inference {
                model: name.to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_model_ids() {
        assert_eq!(
            "AllMiniLML6V2".parse::<TextModelId>().unwrap(),
            TextModelId::AllMiniLML6V2
        );
        assert_eq!(
            "bgesmallenv15".parse::<TextModelId>().unwrap(),
            TextModelId::BGESmallENV15
        );
        assert_eq!(
            "ClipVitB32".parse::<ImageModelId>().unwrap(),
            ImageModelId::ClipVitB32
        );
    }

    #[test]
    fn test_unknown_model_lists_supported() {
        let err = "clip-vit-base-patch32".parse::<ImageModelId>().unwrap_err();
        assert_eq!(err.status_code(), "UNKNOWN_MODEL");
        let message = err.to_string();
        assert!(message.contains("clip-vit-base-patch32"));
        assert!(message.contains("ClipVitB32"));
    }

    #[test]
    fn test_from_config_does_not_load_models() {
        let config = EmbeddingConfig {
            cache_dir: Some(PathBuf::from("/nonexistent/evidex-models")),
            ..EmbeddingConfig::default()
        };
        let backend = FastEmbedBackend::from_config(&config).unwrap();
        assert_eq!(backend.text_model_name(), "AllMiniLML6V2");
        assert_eq!(backend.image_model_name(), "ClipVitB32");
        assert!(backend.text_model.lock().is_none());
        assert!(backend.image_model.lock().is_none());
    }

    #[test]
    #[ignore = "Downloads the text and CLIP models"]
    fn test_real_models_share_image_space() {
        let temp = tempfile::TempDir::new().unwrap();
        let backend = FastEmbedBackend::new(
            TextModelId::AllMiniLML6V2,
            ImageModelId::ClipVitB32,
            temp.path().to_path_buf(),
        );
        let text = backend.embed_texts(&["a red car"]).unwrap();
        assert_eq!(text[0].len(), 384);

        let query = backend.embed_image_queries(&["a red car"]).unwrap();
        assert_eq!(query[0].len(), 512);

        let img_path = temp.path().join("red.png");
        image::RgbImage::from_pixel(224, 224, image::Rgb([220, 10, 10]))
            .save(&img_path)
            .unwrap();
        let images = backend.embed_images(&[img_path.as_path()]).unwrap();
        assert_eq!(images[0].len(), query[0].len());
    }
}
