use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Suffix of the image collection name.
pub const IMAGE_COLLECTION_SUFFIX: &str = "__attachments_image";

/// Suffix of the text collection name.
pub const TEXT_COLLECTION_SUFFIX: &str = "__attachments_text";

/// Extensions routed to the image model.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Extensions routed to the text model.
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Content type of an artifact record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Image,
    Text,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Image => "image",
            Modality::Text => "text",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(Modality::Image),
            "text" => Ok(Modality::Text),
            _ => Err("Unknown modality"),
        }
    }
}

/// How the ingestion pipeline treats a file, decided by its extension alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Image,
    Text,
    Unsupported,
}

impl ArtifactKind {
    /// Classifies a path by its (case-insensitive) extension.
    pub fn classify(path: &Path) -> Self {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return ArtifactKind::Unsupported;
        };
        let ext = ext.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            ArtifactKind::Image
        } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
            ArtifactKind::Text
        } else {
            ArtifactKind::Unsupported
        }
    }

    pub fn modality(&self) -> Option<Modality> {
        match self {
            ArtifactKind::Image => Some(Modality::Image),
            ArtifactKind::Text => Some(Modality::Text),
            ArtifactKind::Unsupported => None,
        }
    }
}

/// The pair of collections that hold one case's artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseCollections {
    pub image: String,
    pub text: String,
}

impl CaseCollections {
    pub fn for_case(case_name: &str) -> Self {
        Self {
            image: format!("{case_name}{IMAGE_COLLECTION_SUFFIX}"),
            text: format!("{case_name}{TEXT_COLLECTION_SUFFIX}"),
        }
    }

    pub fn name(&self, modality: Modality) -> &str {
        match modality {
            Modality::Image => &self.image,
            Modality::Text => &self.text,
        }
    }

    /// Resolves which space a collection name belongs to.
    ///
    /// Exact matches against this case come first; otherwise the naming
    /// suffix decides. Names matching neither return `None`.
    pub fn modality_of(&self, collection: &str) -> Option<Modality> {
        if collection == self.image {
            Some(Modality::Image)
        } else if collection == self.text {
            Some(Modality::Text)
        } else if collection.ends_with(IMAGE_COLLECTION_SUFFIX) {
            Some(Modality::Image)
        } else if collection.ends_with(TEXT_COLLECTION_SUFFIX) {
            Some(Modality::Text)
        } else {
            None
        }
    }
}
