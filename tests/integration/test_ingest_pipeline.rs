//! End-to-end ingestion over temporary artifact trees.

use crate::common::{ArtifactDir, FAIL_MARKER, Pipeline};
use evidex::metadata::FileAttributesExtractor;
use evidex::store::OutputField;
use evidex::{IngestOptions, IngestStatus, Ingestor};
use std::sync::atomic::Ordering;

#[test]
fn test_second_ingestion_performs_zero_inserts() {
    let pipeline = Pipeline::new(16, 8);
    let artifacts = ArtifactDir::new();
    artifacts.add_text("chat/one.txt", "first message");
    artifacts.add_text("notes.md", "# notes");
    artifacts.add_photo("camera/img_001.jpg", 30);

    let extractor = FileAttributesExtractor;
    let ingestor = Ingestor::new(&pipeline.provider, &pipeline.gateway, &extractor, "case7");

    let first = ingestor.ingest(artifacts.path()).unwrap();
    assert_eq!(first.status, IngestStatus::Completed);
    let inserts_after_first = pipeline.store.total_inserts();
    assert_eq!(inserts_after_first, 2);

    let embeds_before = pipeline.backend.text_calls.load(Ordering::SeqCst)
        + pipeline.backend.image_calls.load(Ordering::SeqCst);

    let second = ingestor.ingest(artifacts.path()).unwrap();
    assert_eq!(second.status, IngestStatus::AlreadyIndexed);
    assert_eq!(second.insert_calls, 0);
    assert_eq!(pipeline.store.total_inserts(), inserts_after_first);
    assert_eq!(second.text_rows, 2);
    assert_eq!(second.image_rows, 1);
    assert_eq!(
        pipeline.backend.text_calls.load(Ordering::SeqCst)
            + pipeline.backend.image_calls.load(Ordering::SeqCst),
        embeds_before
    );
}

#[test]
fn test_137_texts_with_batch_100_insert_twice() {
    let pipeline = Pipeline::new(16, 8);
    let artifacts = ArtifactDir::new();
    for i in 0..137 {
        artifacts.add_text(&format!("texts/{i:03}.txt"), &format!("message number {i}"));
    }

    let extractor = FileAttributesExtractor;
    let options = IngestOptions {
        batch_size: 100,
        ..IngestOptions::default()
    };
    let report = Ingestor::new(&pipeline.provider, &pipeline.gateway, &extractor, "bulk")
        .with_options(options)
        .ingest(artifacts.path())
        .unwrap();

    assert_eq!(
        pipeline.store.inserts_into("bulk__attachments_text"),
        vec![100, 37]
    );
    assert!(pipeline.store.inserts_into("bulk__attachments_image").is_empty());
    assert_eq!(report.insert_calls, 2);
    assert_eq!(report.text_rows, 137);
    assert_eq!(pipeline.gateway.row_count("bulk__attachments_text").unwrap(), 137);
}

#[test]
fn test_all_icon_directory_yields_no_image_rows() {
    let pipeline = Pipeline::new(16, 8);
    let artifacts = ArtifactDir::new();
    for i in 0..5u8 {
        artifacts.add_icon(&format!("ui/icon_{i}.png"), i * 40);
    }

    let extractor = FileAttributesExtractor;
    let report = Ingestor::new(&pipeline.provider, &pipeline.gateway, &extractor, "icons")
        .ingest(artifacts.path())
        .unwrap();

    assert_eq!(report.icons_skipped, 5);
    assert_eq!(report.images_embedded, 0);
    assert_eq!(report.image_rows, 0);
    assert_eq!(pipeline.backend.image_calls.load(Ordering::SeqCst), 0);
    // Both collections still exist, so a rerun is skipped.
    assert!(
        Ingestor::new(&pipeline.provider, &pipeline.gateway, &extractor, "icons")
            .would_skip()
            .unwrap()
    );
}

#[test]
fn test_icons_kept_when_filter_disabled() {
    let pipeline = Pipeline::new(16, 8);
    let artifacts = ArtifactDir::new();
    artifacts.add_icon("a.png", 10);
    artifacts.add_icon("b.png", 90);

    let extractor = FileAttributesExtractor;
    let options = IngestOptions {
        filter_icons: false,
        ..IngestOptions::default()
    };
    let report = Ingestor::new(&pipeline.provider, &pipeline.gateway, &extractor, "raw")
        .with_options(options)
        .ingest(artifacts.path())
        .unwrap();

    assert_eq!(report.icons_skipped, 0);
    assert_eq!(report.image_rows, 2);
}

#[test]
fn test_one_failing_text_of_ten_still_completes() {
    let pipeline = Pipeline::new(16, 8);
    let artifacts = ArtifactDir::new();
    for i in 0..10 {
        let body = if i == 4 {
            format!("poisoned {FAIL_MARKER}")
        } else {
            format!("ordinary note {i}")
        };
        artifacts.add_text(&format!("{i}.txt"), &body);
    }

    let extractor = FileAttributesExtractor;
    let report = Ingestor::new(&pipeline.provider, &pipeline.gateway, &extractor, "resilient")
        .ingest(artifacts.path())
        .unwrap();

    assert_eq!(report.status, IngestStatus::Completed);
    assert_eq!(report.failures, 1);
    assert_eq!(report.texts_embedded, 9);
    assert_eq!(report.text_rows, 9);
}

#[cfg(unix)]
#[test]
fn test_unreadable_text_of_ten_still_completes() {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let pipeline = Pipeline::new(16, 8);
    let artifacts = ArtifactDir::new();
    let mut locked = None;
    for i in 0..10 {
        let path = artifacts.add_text(&format!("{i}.txt"), &format!("ordinary note {i}"));
        if i == 6 {
            locked = Some(path);
        }
    }
    let locked = locked.unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read(&locked).is_ok() {
        // Privileged users read through mode 000
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        return;
    }

    let extractor = FileAttributesExtractor;
    let report = Ingestor::new(&pipeline.provider, &pipeline.gateway, &extractor, "locked")
        .ingest(artifacts.path())
        .unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();

    assert_eq!(report.status, IngestStatus::Completed);
    assert_eq!(report.failures, 1);
    assert_eq!(report.texts_embedded, 9);
    assert_eq!(report.text_rows, 9);
}

#[test]
fn test_corrupt_image_is_skipped() {
    let pipeline = Pipeline::new(16, 8);
    let artifacts = ArtifactDir::new();
    artifacts.add_text("broken.png", "this is not a png");
    artifacts.add_photo("fine.png", 120);

    let extractor = FileAttributesExtractor;
    let report = Ingestor::new(&pipeline.provider, &pipeline.gateway, &extractor, "mixed")
        .ingest(artifacts.path())
        .unwrap();

    assert_eq!(report.failures, 1);
    assert_eq!(report.image_rows, 1);
}

#[test]
fn test_records_carry_metadata_and_modality() {
    let pipeline = Pipeline::new(16, 8);
    let artifacts = ArtifactDir::new();
    artifacts.add_photo("evidence/scene.png", 200);
    artifacts.add_text("evidence/statement.txt", "I saw the van leave at 22:10");

    let extractor = FileAttributesExtractor;
    Ingestor::new(&pipeline.provider, &pipeline.gateway, &extractor, "meta")
        .ingest(artifacts.path())
        .unwrap();

    let images = pipeline
        .gateway
        .pattern_query(
            "meta__attachments_image",
            OutputField::Path,
            "scene.png",
            5,
            OutputField::ALL,
        )
        .unwrap();
    assert_eq!(images.len(), 1);
    let fields = &images[0].fields;
    assert_eq!(fields["modality"], "image");
    assert_eq!(fields["content"], "");
    let metadata = &fields["metadata"];
    assert_eq!(metadata["File:ImageWidth"], "240");
    assert_eq!(metadata["File:MIMEType"], "image/png");
    assert!(metadata.get("File:FileName").is_none());

    let texts = pipeline
        .gateway
        .pattern_query(
            "meta__attachments_text",
            OutputField::Content,
            "22:10",
            5,
            OutputField::ALL,
        )
        .unwrap();
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].fields["modality"], "text");
}
