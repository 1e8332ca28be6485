//! A file-backed store survives the process that built it.

use crate::common::{ArtifactDir, HashingBackend};
use evidex::config::StoreConfig;
use evidex::metadata::FileAttributesExtractor;
use evidex::{EmbeddingProvider, IngestStatus, Ingestor, Retriever, StoreGateway};
use std::sync::Arc;
use tempfile::TempDir;

fn file_store(root: &TempDir) -> StoreConfig {
    StoreConfig {
        uri: root.path().to_string_lossy().to_string(),
        db_name: "cases".to_string(),
        token: None,
    }
}

#[test]
fn test_reopened_store_keeps_collections_and_rows() {
    let store_dir = TempDir::new().unwrap();
    let artifacts = ArtifactDir::new();
    artifacts.add_text("a.txt", "the courier arrives at midnight");
    artifacts.add_text("b.txt", "invoice number 4471");
    artifacts.add_photo("c.png", 77);

    let provider = EmbeddingProvider::new(Arc::new(HashingBackend::new(16, 8)));
    let extractor = FileAttributesExtractor;

    {
        let gateway = StoreGateway::new(&file_store(&store_dir));
        let report = Ingestor::new(&provider, &gateway, &extractor, "disk")
            .ingest(artifacts.path())
            .unwrap();
        assert_eq!(report.text_rows, 2);
        assert_eq!(report.image_rows, 1);
    }

    assert!(
        store_dir
            .path()
            .join("cases/disk__attachments_text/vectors.seg")
            .is_file()
    );

    let gateway = StoreGateway::new(&file_store(&store_dir));
    let ingestor = Ingestor::new(&provider, &gateway, &extractor, "disk");
    assert!(ingestor.would_skip().unwrap());
    let rerun = ingestor.ingest(artifacts.path()).unwrap();
    assert_eq!(rerun.status, IngestStatus::AlreadyIndexed);
    assert_eq!(rerun.text_rows, 2);

    let retriever = Retriever::new(&provider, &gateway, "disk");
    let hits = retriever
        .search_texts("the courier arrives at midnight", Some(1))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].path().unwrap().ends_with("a.txt"));

    let listed = retriever.list_collections().unwrap();
    let names: Vec<_> = listed.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["disk__attachments_image", "disk__attachments_text"]);
}

#[test]
fn test_dropped_collection_stays_dropped() {
    let store_dir = TempDir::new().unwrap();
    let artifacts = ArtifactDir::new();
    artifacts.add_text("a.txt", "alpha");

    let provider = EmbeddingProvider::new(Arc::new(HashingBackend::new(8, 4)));
    let extractor = FileAttributesExtractor;

    let gateway = StoreGateway::new(&file_store(&store_dir));
    Ingestor::new(&provider, &gateway, &extractor, "gone")
        .ingest(artifacts.path())
        .unwrap();
    gateway.drop_collection("gone__attachments_text").unwrap();
    drop(gateway);

    let gateway = StoreGateway::new(&file_store(&store_dir));
    assert!(!gateway.has_collection("gone__attachments_text").unwrap());
    assert!(gateway.has_collection("gone__attachments_image").unwrap());
    assert!(
        !Ingestor::new(&provider, &gateway, &extractor, "gone")
            .would_skip()
            .unwrap()
    );
}

#[test]
fn test_remote_uri_is_unavailable() {
    let gateway = StoreGateway::new(&StoreConfig {
        uri: "http://localhost:19530".to_string(),
        db_name: "default".to_string(),
        token: Some("root:Milvus".to_string()),
    });
    let err = gateway.list_collections().unwrap_err();
    assert_eq!(err.status_code(), "STORE_UNAVAILABLE");
    assert!(!gateway.is_connected());
}
