#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use evidex::error::{EmbeddingError, EmbeddingResult, StoreResult};
use evidex::store::{
    ArtifactRecord, CollectionInfo, CollectionSchema, Hit, LocalStore, PatternQuery,
    SearchRequest, VectorStore,
};
use evidex::{EmbeddingBackend, EmbeddingProvider, StoreGateway};
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use tempfile::TempDir;

/// Marker that makes [`HashingBackend`] fail on a text.
pub const FAIL_MARKER: &str = "__EMBED_FAIL__";

/// Deterministic embedding backend.
///
/// Texts become byte histograms, image-space queries use a salted
/// histogram and images carry their mean colour.
pub struct HashingBackend {
    pub text_dim: usize,
    pub image_dim: usize,
    pub text_calls: AtomicUsize,
    pub image_query_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
}

impl HashingBackend {
    pub fn new(text_dim: usize, image_dim: usize) -> Self {
        Self {
            text_dim,
            image_dim,
            text_calls: AtomicUsize::new(0),
            image_query_calls: AtomicUsize::new(0),
            image_calls: AtomicUsize::new(0),
        }
    }

    fn histogram(text: &str, dim: usize, salt: usize) -> Vec<f32> {
        let mut embedding = vec![0.1; dim];
        for (i, byte) in text.bytes().enumerate() {
            embedding[(byte as usize * 31 + i + salt) % dim] += 1.0;
        }
        embedding
    }
}

impl EmbeddingBackend for HashingBackend {
    fn text_model_name(&self) -> &str {
        "hashing-text"
    }

    fn image_model_name(&self) -> &str {
        "hashing-image"
    }

    fn embed_texts(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        texts
            .iter()
            .map(|text| {
                if text.contains(FAIL_MARKER) {
                    Err(EmbeddingError::Inference {
                        model: "hashing-text".to_string(),
                        reason: "refusing marked input".to_string(),
                    })
                } else {
                    Ok(Self::histogram(text, self.text_dim, 0))
                }
            })
            .collect()
    }

    fn embed_image_queries(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        self.image_query_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|text| Self::histogram(text, self.image_dim, 11))
            .collect())
    }

    fn embed_images(&self, paths: &[&Path]) -> EmbeddingResult<Vec<Vec<f32>>> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        paths
            .iter()
            .map(|path| {
                let rgb = image::open(path)
                    .map_err(|e| EmbeddingError::ImageDecode {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    })?
                    .to_rgb8();
                let pixels = (rgb.width() * rgb.height()).max(1) as f32;
                let mut embedding = vec![0.1; self.image_dim];
                for pixel in rgb.pixels() {
                    for (slot, channel) in embedding.iter_mut().zip(pixel.0) {
                        *slot += channel as f32 / 255.0 / pixels;
                    }
                }
                Ok(embedding)
            })
            .collect()
    }
}

/// Store wrapper that records the size of every insert call.
pub struct CountingStore {
    inner: LocalStore,
    pub insert_sizes: Mutex<Vec<(String, usize)>>,
}

impl CountingStore {
    pub fn new(inner: LocalStore) -> Self {
        Self {
            inner,
            insert_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn inserts_into(&self, collection: &str) -> Vec<usize> {
        self.insert_sizes
            .lock()
            .iter()
            .filter(|(name, _)| name == collection)
            .map(|(_, size)| *size)
            .collect()
    }

    pub fn total_inserts(&self) -> usize {
        self.insert_sizes.lock().len()
    }
}

impl VectorStore for CountingStore {
    fn backend_name(&self) -> &'static str {
        "counting"
    }

    fn list_collections(&self) -> StoreResult<Vec<String>> {
        self.inner.list_collections()
    }

    fn has_collection(&self, name: &str) -> StoreResult<bool> {
        self.inner.has_collection(name)
    }

    fn create_collection(&self, schema: CollectionSchema) -> StoreResult<()> {
        self.inner.create_collection(schema)
    }

    fn drop_collection(&self, name: &str) -> StoreResult<()> {
        self.inner.drop_collection(name)
    }

    fn describe_collection(&self, name: &str) -> StoreResult<CollectionInfo> {
        self.inner.describe_collection(name)
    }

    fn insert(&self, name: &str, records: Vec<ArtifactRecord>) -> StoreResult<Vec<u64>> {
        self.insert_sizes
            .lock()
            .push((name.to_string(), records.len()));
        self.inner.insert(name, records)
    }

    fn flush(&self, name: &str) -> StoreResult<()> {
        self.inner.flush(name)
    }

    fn row_count(&self, name: &str) -> StoreResult<u64> {
        self.inner.row_count(name)
    }

    fn search(&self, request: &SearchRequest) -> StoreResult<Vec<Hit>> {
        self.inner.search(request)
    }

    fn query(&self, query: &PatternQuery) -> StoreResult<Vec<Hit>> {
        self.inner.query(query)
    }
}

/// Provider, counting store and gateway wired together.
pub struct Pipeline {
    pub backend: Arc<HashingBackend>,
    pub provider: EmbeddingProvider,
    pub store: Arc<CountingStore>,
    pub gateway: StoreGateway,
}

impl Pipeline {
    pub fn new(text_dim: usize, image_dim: usize) -> Self {
        let backend = Arc::new(HashingBackend::new(text_dim, image_dim));
        let provider = EmbeddingProvider::new(backend.clone());
        let store = Arc::new(CountingStore::new(LocalStore::in_memory()));
        let gateway = StoreGateway::with_store(store.clone());
        Self {
            backend,
            provider,
            store,
            gateway,
        }
    }
}

/// A temporary artifact directory.
pub struct ArtifactDir {
    pub dir: TempDir,
}

impl ArtifactDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn add_text(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.prepare(relative);
        fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// 32×32 single-colour PNG: an icon by every rule.
    pub fn add_icon(&self, relative: &str, shade: u8) -> PathBuf {
        let path = self.prepare(relative);
        RgbImage::from_pixel(32, 32, Rgb([shade, 40, 200 - shade / 2]))
            .save(&path)
            .expect("Failed to write icon");
        path
    }

    /// 240×180 gradient PNG: too large to be an icon.
    pub fn add_photo(&self, relative: &str, tint: u8) -> PathBuf {
        let path = self.prepare(relative);
        RgbImage::from_fn(240, 180, |x, y| {
            Rgb([
                ((x + tint as u32) % 256) as u8,
                ((y * 2) % 256) as u8,
                tint,
            ])
        })
        .save(&path)
        .expect("Failed to write photo");
        path
    }

    fn prepare(&self, relative: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        path
    }
}
