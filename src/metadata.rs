//! Per-file descriptive metadata.
//!
//! The ingestion pipeline treats metadata as an opaque string mapping produced
//! by a [`MetadataExtractor`]. Keys that leak the evidence location or any
//! timestamp are dropped on insertion so they never reach the index.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MetadataError;

/// Key fragments that are never stored, matched case-insensitively.
pub const EXCLUDED_KEY_PATTERNS: &[&str] = &[
    "File:Directory",
    "File:FileName",
    "SourceFile",
    "File:FileModifyDate",
    "File:FileAccessDate",
    "File:FileCreateDate",
    "File:FileInodeChangeDate",
    "EXIF:CreateDate",
    "EXIF:ModifyDate",
    "EXIF:DateTimeOriginal",
    "XMP:CreateDate",
    "XMP:ModifyDate",
    "XMP:DateCreated",
    "IPTC:DateCreated",
    "IPTC:TimeCreated",
    ":Date",
    ":Time",
];

/// Sorted `key -> value` attributes of one artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` names a directory or date attribute.
    pub fn is_excluded(key: &str) -> bool {
        let key = key.to_lowercase();
        EXCLUDED_KEY_PATTERNS
            .iter()
            .any(|pattern| key.contains(&pattern.to_lowercase()))
    }

    /// Inserts an attribute unless it is excluded or its value is blank.
    ///
    /// Returns whether the attribute was kept.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        let value = value.into();
        if value.trim().is_empty() || Self::is_excluded(&key) {
            return false;
        }
        self.0.insert(key, value);
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Newline-joined `key: value` block in key order.
    pub fn render(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (k, v) in iter {
            metadata.insert(k, v);
        }
        metadata
    }
}

/// Produces metadata for a file on disk.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Metadata, MetadataError>;
}

impl<F> MetadataExtractor for F
where
    F: Fn(&Path) -> Result<Metadata, MetadataError> + Send + Sync,
{
    fn extract(&self, path: &Path) -> Result<Metadata, MetadataError> {
        self(path)
    }
}

/// Extractor backed by filesystem attributes and image headers.
///
/// Reports size, type, extension, MIME type, unix permissions and, for
/// decodable images, pixel dimensions. Never reports names or dates.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileAttributesExtractor;

impl MetadataExtractor for FileAttributesExtractor {
    fn extract(&self, path: &Path) -> Result<Metadata, MetadataError> {
        let attrs = std::fs::metadata(path).map_err(|source| MetadataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if !attrs.is_file() {
            return Err(MetadataError::Extraction {
                path: path.to_path_buf(),
                reason: "not a regular file".to_string(),
            });
        }

        let mut metadata = Metadata::new();
        metadata.insert("File:FileSize", attrs.len().to_string());

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let (file_type, mime) = file_type_of(&extension);
        metadata.insert("File:FileType", file_type);
        metadata.insert("File:FileTypeExtension", extension);
        metadata.insert("File:MIMEType", mime);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = attrs.permissions().mode() & 0o777;
            metadata.insert("File:FilePermissions", format!("{mode:o}"));
        }

        if mime.starts_with("image/") {
            // Header-only read; failure just means no dimensions
            if let Ok((width, height)) = image::image_dimensions(path) {
                metadata.insert("File:ImageWidth", width.to_string());
                metadata.insert("File:ImageHeight", height.to_string());
                metadata.insert("Composite:ImageSize", format!("{width}x{height}"));
            }
        }

        Ok(metadata)
    }
}

fn file_type_of(extension: &str) -> (&'static str, &'static str) {
    match extension {
        "png" => ("PNG", "image/png"),
        "jpg" | "jpeg" => ("JPEG", "image/jpeg"),
        "txt" => ("TXT", "text/plain"),
        "md" => ("MD", "text/markdown"),
        _ => ("BIN", "application/octet-stream"),
    }
}
