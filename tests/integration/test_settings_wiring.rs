//! Settings drive the ingestor and retriever end to end.

use crate::common::{ArtifactDir, HashingBackend};
use evidex::metadata::FileAttributesExtractor;
use evidex::{EmbeddingProvider, Ingestor, Retriever, Settings, StoreGateway};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

#[test]
fn test_settings_file_configures_a_whole_run() {
    let workspace = TempDir::new().unwrap();
    let cases = ArtifactDir::new();
    cases.add_text("op-lighthouse/Export/Attachments/chat.txt", "the boat leaves at dawn");
    cases.add_photo("op-lighthouse/Export/Attachments/pier.jpg", 90);

    let config_path = workspace.path().join("settings.toml");
    fs::write(
        &config_path,
        format!(
            r#"
case_name = "op-lighthouse"

[paths]
base_dir = "{}"

[store]
uri = "memory://"

[ingest]
batch_size = 1
snippet_chars = 8

[search]
limit = 1
output_fields = ["path", "content"]
"#,
            cases.path().display()
        ),
    )
    .unwrap();

    let settings = Settings::load_from(&config_path).unwrap();
    settings.validate().unwrap();
    assert_eq!(
        settings.attachments_dir(),
        cases.path().join("op-lighthouse/Export/Attachments")
    );

    let provider = EmbeddingProvider::new(Arc::new(HashingBackend::new(16, 8)))
        .with_snippet_chars(settings.ingest.snippet_chars);
    let gateway = StoreGateway::new(&settings.store);
    let extractor = FileAttributesExtractor;

    let report = Ingestor::from_settings(&provider, &gateway, &extractor, &settings)
        .ingest(&settings.attachments_dir())
        .unwrap();
    assert_eq!(report.image_collection, "op-lighthouse__attachments_image");
    assert_eq!(report.insert_calls, 2);
    assert_eq!(report.text_rows, 1);
    assert_eq!(report.image_rows, 1);

    let retriever = Retriever::from_settings(&provider, &gateway, &settings);
    let hits = retriever.search_texts("the boat", None).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].fields["content"], "the boat");
    assert!(!hits[0].fields.contains_key("modality"));
}

#[test]
fn test_init_template_round_trips() {
    let workspace = TempDir::new().unwrap();
    let path = Settings::init_config_file_in(workspace.path(), false).unwrap();
    assert!(path.ends_with(".evidex/settings.toml"));
    assert!(Settings::init_config_file_in(workspace.path(), false).is_err());
    assert!(Settings::init_config_file_in(workspace.path(), true).is_ok());

    let settings = Settings::load_from(&path).unwrap();
    assert_eq!(settings.collections().text, "default_case__attachments_text");
    assert_eq!(settings.ingest.batch_size, 100);
}
