//! Query-time behaviour: encoder routing, ranking and the error payload.

use crate::common::{ArtifactDir, Pipeline};
use evidex::metadata::{FileAttributesExtractor, Metadata};
use evidex::store::{ArtifactRecord, OutputField, SearchRequest};
use evidex::vector::{EmbeddingVector, Metric, TextSpace, UNIT_NORM_TOLERANCE, VectorDimension};
use evidex::{Ingestor, Retriever};
use std::sync::atomic::Ordering;

/// Unit vector whose cosine with `e0` is exactly `cosine`.
fn at_cosine(cosine: f32, dim: usize) -> EmbeddingVector<TextSpace> {
    let mut values = vec![0.0; dim];
    values[0] = cosine;
    values[1] = (1.0 - cosine * cosine).sqrt();
    EmbeddingVector::normalized(values).unwrap()
}

#[test]
fn test_ranking_returns_best_two_descending() {
    let pipeline = Pipeline::new(4, 4);
    let dim = VectorDimension::new(4).unwrap();
    pipeline
        .gateway
        .create_collection("rank__attachments_text", dim, Metric::Cosine)
        .unwrap();

    let records = [(0.5, "/mid.txt"), (0.1, "/far.txt"), (0.9, "/near.txt")]
        .into_iter()
        .map(|(cosine, path)| ArtifactRecord::new(at_cosine(cosine, 4), path, "", Metadata::new()))
        .collect();
    pipeline
        .gateway
        .insert("rank__attachments_text", records)
        .unwrap();
    pipeline.gateway.flush("rank__attachments_text").unwrap();

    let request = SearchRequest::new("rank__attachments_text", vec![1.0, 0.0, 0.0, 0.0]).limit(2);
    let hits = pipeline.gateway.search(&request).unwrap();

    let paths: Vec<_> = hits.iter().filter_map(|h| h.path()).collect();
    assert_eq!(paths, vec!["/near.txt", "/mid.txt"]);
    assert!((hits[0].score.unwrap() - 0.9).abs() < 1e-5);
    assert!((hits[1].score.unwrap() - 0.5).abs() < 1e-5);
}

#[test]
fn test_image_search_uses_image_space_encoder_with_equal_dimensions() {
    let pipeline = Pipeline::new(8, 8);
    let artifacts = ArtifactDir::new();
    artifacts.add_photo("a.png", 10);
    artifacts.add_photo("b.png", 220);

    let extractor = FileAttributesExtractor;
    Ingestor::new(&pipeline.provider, &pipeline.gateway, &extractor, "same")
        .ingest(artifacts.path())
        .unwrap();

    let text_before = pipeline.backend.text_calls.load(Ordering::SeqCst);
    let image_query_before = pipeline.backend.image_query_calls.load(Ordering::SeqCst);

    let retriever = Retriever::new(&pipeline.provider, &pipeline.gateway, "same");
    let hits = retriever
        .search_by_text("a bright photo", "same__attachments_image", Some(5), None)
        .unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(
        pipeline.backend.text_calls.load(Ordering::SeqCst),
        text_before
    );
    assert_eq!(
        pipeline.backend.image_query_calls.load(Ordering::SeqCst),
        image_query_before + 1
    );
}

#[test]
fn test_text_search_finds_matching_snippet() {
    let pipeline = Pipeline::new(32, 8);
    let artifacts = ArtifactDir::new();
    artifacts.add_text("a.txt", "transfer 5000 EUR to the offshore account");
    artifacts.add_text("b.txt", "see you at the football match on sunday");
    artifacts.add_text("c.md", "grocery list: eggs, milk, bread");

    let extractor = FileAttributesExtractor;
    Ingestor::new(&pipeline.provider, &pipeline.gateway, &extractor, "fin")
        .ingest(artifacts.path())
        .unwrap();

    let retriever = Retriever::new(&pipeline.provider, &pipeline.gateway, "fin");
    let hits = retriever
        .search_by_text(
            "transfer 5000 EUR to the offshore account",
            "fin__attachments_text",
            Some(3),
            Some(&[OutputField::Path, OutputField::Content]),
        )
        .unwrap();

    assert_eq!(hits.len(), 3);
    assert!(hits[0].path().unwrap().ends_with("a.txt"));
    assert!((hits[0].score.unwrap() - 1.0).abs() < 1e-4);
    assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(hits[0].fields.contains_key("content"));
    assert!(!hits[0].fields.contains_key("metadata"));

    let grep = retriever
        .text_search("fin__attachments_text", "football", OutputField::Content, None, None)
        .unwrap();
    assert_eq!(grep.len(), 1);
    assert!(grep[0].path().unwrap().ends_with("b.txt"));
}

#[test]
fn test_provider_vectors_are_unit_length() {
    let pipeline = Pipeline::new(12, 6);
    let dims = pipeline.provider.dimensions().unwrap();
    assert_eq!(dims.text.get(), 12);
    assert_eq!(dims.image.get(), 6);

    let text = pipeline.provider.embed_text("some words").unwrap();
    assert_eq!(text.len(), 12);
    assert!((text.norm() - 1.0).abs() < UNIT_NORM_TOLERANCE);

    let query = pipeline
        .provider
        .embed_query_for_image_space("some words")
        .unwrap();
    assert_eq!(query.len(), 6);
    assert!((query.norm() - 1.0).abs() < UNIT_NORM_TOLERANCE);
}

#[test]
fn test_contract_errors_become_payloads() {
    let pipeline = Pipeline::new(8, 4);
    let retriever = Retriever::new(&pipeline.provider, &pipeline.gateway, "none");

    let missing = retriever.search_images("anything", None).unwrap_err();
    assert_eq!(missing.to_payload()["code"], "COLLECTION_NOT_FOUND");

    pipeline
        .gateway
        .create_collection(
            "none__attachments_image",
            VectorDimension::new(5).unwrap(),
            Metric::Cosine,
        )
        .unwrap();
    let mismatch = retriever.search_images("anything", None).unwrap_err();
    let payload = mismatch.to_payload();
    assert_eq!(payload["code"], "DIMENSION_MISMATCH");
    let message = payload["error"].as_str().unwrap();
    assert!(message.contains("none__attachments_image"));

    let unknown = retriever
        .search_by_text("anything", "orphans", None, None)
        .unwrap_err();
    assert_eq!(unknown.to_payload()["code"], "UNKNOWN_COLLECTION_SPACE");
}
