//! Configuration module for the case-artifact index.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `EVX_` and use double underscores
//! to separate nested levels:
//! - `EVX_CASE_NAME=case42` sets `case_name`
//! - `EVX_STORE__URI=memory://` sets `store.uri`
//! - `EVX_INGEST__BATCH_SIZE=50` sets `ingest.batch_size`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::store::OutputField;
use crate::types::CaseCollections;

/// Name of the per-workspace configuration directory.
pub const CONFIG_DIR: &str = ".evidex";

/// Name of the settings file inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Case identifier; prefixes both collection names
    #[serde(default = "default_case_name")]
    pub case_name: String,

    /// Evidence and log locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Vector store connection
    #[serde(default)]
    pub store: StoreConfig,

    /// Model selection
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Ingestion pipeline settings
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Retrieval defaults
    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PathsConfig {
    /// Root holding one directory per case
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Attachment directory, relative to the case directory
    #[serde(default = "default_attached_artifact_dir")]
    pub attached_artifact_dir: PathBuf,

    /// Where run logs are written
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    /// `memory://`, a directory path, or a `file://` URI
    #[serde(default = "default_store_uri")]
    pub uri: String,

    #[serde(default = "default_db_name")]
    pub db_name: String,

    /// Access token for stores that need one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Text model identifier
    #[serde(default = "default_text_model")]
    pub text_model: String,

    /// Image model identifier; its text tower embeds image-space queries
    #[serde(default = "default_image_model")]
    pub image_model: String,

    /// Model download cache; defaults to the user cache directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_false")]
    pub show_download_progress: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IngestConfig {
    /// Records per insert call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Characters of text kept for embedding and the `content` field
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,

    /// Reject small low-colour images
    #[serde(default = "default_true")]
    pub filter_icons: bool,

    /// Also require icons to be at most 10 000 bytes on disk
    #[serde(default = "default_false")]
    pub icon_size_guard: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_limit")]
    pub limit: usize,

    #[serde(default = "default_output_fields")]
    pub output_fields: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Console level; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write a DEBUG log file under `paths.log_dir`
    #[serde(default = "default_true")]
    pub file: bool,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_case_name() -> String {
    "default_case".to_string()
}
fn default_base_dir() -> PathBuf {
    PathBuf::from("test/backup")
}
fn default_attached_artifact_dir() -> PathBuf {
    PathBuf::from("Export/Attachments")
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}
fn default_store_uri() -> String {
    format!("{CONFIG_DIR}/store")
}
fn default_db_name() -> String {
    "default".to_string()
}
fn default_text_model() -> String {
    "AllMiniLML6V2".to_string()
}
fn default_image_model() -> String {
    "ClipVitB32".to_string()
}
fn default_batch_size() -> usize {
    100
}
fn default_snippet_chars() -> usize {
    500
}
fn default_search_limit() -> usize {
    5
}
fn default_output_fields() -> Vec<String> {
    OutputField::DEFAULT
        .iter()
        .map(|f| f.as_str().to_string())
        .collect()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            case_name: default_case_name(),
            paths: PathsConfig::default(),
            store: StoreConfig::default(),
            embedding: EmbeddingConfig::default(),
            ingest: IngestConfig::default(),
            search: SearchConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            attached_artifact_dir: default_attached_artifact_dir(),
            log_dir: default_log_dir(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: default_store_uri(),
            db_name: default_db_name(),
            token: None,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            text_model: default_text_model(),
            image_model: default_image_model(),
            cache_dir: None,
            show_download_progress: false,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            snippet_chars: default_snippet_chars(),
            filter_icons: true,
            icon_size_guard: false,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_search_limit(),
            output_fields: default_output_fields(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: true,
        }
    }
}

impl EmbeddingConfig {
    /// Model cache directory with the platform default filled in.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        match &self.cache_dir {
            Some(dir) => dir.clone(),
            None => dirs::cache_dir()
                .map(|dir| dir.join("evidex").join("models"))
                .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("models")),
        }
    }
}

impl SearchConfig {
    /// Parses the configured output field names.
    pub fn parsed_output_fields(&self) -> Result<Vec<OutputField>, String> {
        self.output_fields
            .iter()
            .map(|name| name.parse::<OutputField>())
            .collect()
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honouring `EVX_` overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // Double underscore separates nested levels; single underscores stay
            .merge(Env::prefixed("EVX_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the workspace config by looking for a .evidex directory
    /// from the current directory up to the root
    fn find_workspace_config() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|ancestor| ancestor.join(CONFIG_DIR))
            .find(|dir| dir.is_dir())
            .map(|dir| dir.join(CONFIG_FILE))
    }

    /// Rejects values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.case_name.trim().is_empty() {
            return Err("case_name must not be empty".to_string());
        }
        if self.ingest.batch_size == 0 {
            return Err("ingest.batch_size must be greater than zero".to_string());
        }
        if self.ingest.snippet_chars == 0 {
            return Err("ingest.snippet_chars must be greater than zero".to_string());
        }
        if self.search.limit == 0 {
            return Err("search.limit must be greater than zero".to_string());
        }
        self.search.parsed_output_fields()?;
        Ok(())
    }

    /// `{base_dir}/{case_name}/{attached_artifact_dir}`
    pub fn attachments_dir(&self) -> PathBuf {
        self.paths
            .base_dir
            .join(&self.case_name)
            .join(&self.paths.attached_artifact_dir)
    }

    /// Image and text collection names for the configured case
    pub fn collections(&self) -> CaseCollections {
        CaseCollections::for_case(&self.case_name)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        Self::init_config_file_in(Path::new("."), force)
    }

    /// Same as [`Settings::init_config_file`] rooted at `root`
    pub fn init_config_file_in(
        root: &Path,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = format!(
            r#"# evidex configuration file

# Version of the configuration schema
version = {version}

# Case identifier. Collections are named <case_name>__attachments_image
# and <case_name>__attachments_text
case_name = "{case_name}"

[paths]
# Attachments are read from <base_dir>/<case_name>/<attached_artifact_dir>
base_dir = "{base_dir}"
attached_artifact_dir = "{attached}"
log_dir = "{log_dir}"

[store]
# memory:// for a throwaway store, otherwise a directory (or file:// URI)
uri = "{uri}"
db_name = "{db_name}"
# token = ""

[embedding]
# Text models: AllMiniLML6V2, AllMiniLML12V2, BGESmallENV15, BGEBaseENV15,
#              NomicEmbedTextV15, MultilingualE5Small, ParaphraseMLMiniLML12V2
text_model = "{text_model}"
# Image models: ClipVitB32, NomicEmbedVisionV15
image_model = "{image_model}"
# cache_dir = "~/.cache/evidex/models"
show_download_progress = false

[ingest]
batch_size = {batch_size}
snippet_chars = {snippet_chars}
filter_icons = true
# Only treat an image as an icon when the file is at most 10 000 bytes
icon_size_guard = false

[search]
limit = {limit}
output_fields = ["path", "modality", "metadata"]

[logging]
# Overridden by RUST_LOG when set
level = "info"
# Write a DEBUG log file per run into paths.log_dir
file = true
"#,
            version = default_version(),
            case_name = default_case_name(),
            base_dir = default_base_dir().display(),
            attached = default_attached_artifact_dir().display(),
            log_dir = default_log_dir().display(),
            uri = default_store_uri(),
            db_name = default_db_name(),
            text_model = default_text_model(),
            image_model = default_image_model(),
            batch_size = default_batch_size(),
            snippet_chars = default_snippet_chars(),
            limit = default_search_limit(),
        );

        std::fs::write(&config_path, template)?;

        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.version, 1);
        assert_eq!(settings.case_name, "default_case");
        assert_eq!(settings.ingest.batch_size, 100);
        assert_eq!(settings.ingest.snippet_chars, 500);
        assert!(settings.ingest.filter_icons);
        assert!(!settings.ingest.icon_size_guard);
        assert_eq!(settings.search.limit, 5);
        assert_eq!(
            settings.search.output_fields,
            vec!["path", "modality", "metadata"]
        );
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_attachments_dir_and_collections() {
        let mut settings = Settings::default();
        settings.case_name = "case07".to_string();
        assert_eq!(
            settings.attachments_dir(),
            PathBuf::from("test/backup/case07/Export/Attachments")
        );
        let names = settings.collections();
        assert_eq!(names.image, "case07__attachments_image");
        assert_eq!(names.text, "case07__attachments_text");
    }

    #[test]
    fn test_partial_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");

        let toml_content = r#"
case_name = "phone_dump"

[ingest]
batch_size = 25

[store]
uri = "memory://"
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();

        assert_eq!(settings.case_name, "phone_dump");
        assert_eq!(settings.ingest.batch_size, 25);
        assert_eq!(settings.store.uri, "memory://");
        // Defaults fill the rest
        assert_eq!(settings.embedding.text_model, "AllMiniLML6V2");
        assert_eq!(settings.embedding.image_model, "ClipVitB32");
        assert!(settings.logging.file);
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("settings.toml");
        fs::write(&config_path, "[store]\ndb_name = \"from_file\"\n").unwrap();

        unsafe {
            std::env::set_var("EVX_STORE__DB_NAME", "from_env");
        }
        let settings = Settings::load_from(&config_path).unwrap();
        unsafe {
            std::env::remove_var("EVX_STORE__DB_NAME");
        }

        assert_eq!(settings.store.db_name, "from_env");
    }

    #[test]
    fn test_validation_rejects_zero_batch() {
        let mut settings = Settings::default();
        settings.ingest.batch_size = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.contains("batch_size"));

        let mut settings = Settings::default();
        settings.search.output_fields = vec!["path".into(), "vector".into()];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_init_template_parses_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = Settings::init_config_file_in(temp_dir.path(), false).unwrap();
        assert!(path.ends_with(".evidex/settings.toml"));

        // Second call without force refuses to overwrite
        assert!(Settings::init_config_file_in(temp_dir.path(), false).is_err());
        assert!(Settings::init_config_file_in(temp_dir.path(), true).is_ok());

        let content = fs::read_to_string(&path).unwrap();
        let parsed: Settings = toml::from_str(&content).unwrap();
        let defaults = Settings::default();
        assert_eq!(parsed.case_name, defaults.case_name);
        assert_eq!(parsed.store.uri, defaults.store.uri);
        assert_eq!(parsed.ingest.batch_size, defaults.ingest.batch_size);
        assert_eq!(parsed.search.output_fields, defaults.search.output_fields);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("settings.toml");

        let mut settings = Settings::default();
        settings.case_name = "saved".into();
        settings.ingest.filter_icons = false;
        settings.save(&config_path).unwrap();

        let content = fs::read_to_string(&config_path).unwrap();
        let loaded: Settings = toml::from_str(&content).unwrap();
        assert_eq!(loaded.case_name, "saved");
        assert!(!loaded.ingest.filter_icons);
    }
}
