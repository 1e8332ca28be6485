//! Embedded vector store.
//!
//! Collections live in memory and, when the store has a root directory, are
//! mirrored to disk one directory per collection:
//!
//! - `schema.json`: schema, counters and timestamps (rewritten on flush)
//! - `vectors.seg`: [`VectorSegment`] holding `id + vector` entries
//! - `records.jsonl`: one JSON object of scalar fields per row
//!
//! `schema.json` is written last and is authoritative for the row count, so a
//! flush interrupted half-way leaves the previous state readable.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::metadata::Metadata;
use crate::store::{
    ArtifactRecord, CollectionInfo, CollectionSchema, Hit, PatternQuery, SearchRequest,
    VectorSegment, VectorStore,
};
use crate::types::Modality;
use crate::vector::score;

const SCHEMA_FILE: &str = "schema.json";
const SEGMENT_FILE: &str = "vectors.seg";
const RECORDS_FILE: &str = "records.jsonl";
const FORMAT_VERSION: u32 = 1;

/// Persisted collection header.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CollectionState {
    format_version: u32,
    schema: CollectionSchema,
    next_id: u64,
    row_count: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Scalar fields of a row as written to `records.jsonl`.
#[derive(Debug, Serialize, Deserialize)]
struct RowLine {
    id: u64,
    path: String,
    modality: Modality,
    #[serde(default)]
    content: String,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Clone)]
struct Row {
    id: u64,
    record: ArtifactRecord,
}

#[derive(Debug)]
struct Collection {
    state: CollectionState,
    sealed: Vec<Row>,
    pending: Vec<Row>,
    files: Option<CollectionFiles>,
}

#[derive(Debug)]
struct CollectionFiles {
    dir: PathBuf,
    segment: VectorSegment,
}

impl Collection {
    fn info(&self) -> CollectionInfo {
        CollectionInfo {
            schema: self.state.schema.clone(),
            row_count: self.state.row_count,
            pending_count: self.pending.len() as u64,
            created_at: self.state.created_at,
            updated_at: self.state.updated_at,
        }
    }
}

/// In-process store, optionally persisted under a directory.
#[derive(Debug)]
pub struct LocalStore {
    root: Option<PathBuf>,
    collections: RwLock<BTreeMap<String, Collection>>,
}

impl LocalStore {
    /// Store that lives only as long as this value.
    pub fn in_memory() -> Self {
        Self {
            root: None,
            collections: RwLock::new(BTreeMap::new()),
        }
    }

    /// Opens (or creates) a persisted store rooted at `root`.
    ///
    /// Every subdirectory holding a `schema.json` is loaded as a collection.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;

        let mut collections = BTreeMap::new();
        let entries = fs::read_dir(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: root.clone(),
                source,
            })?;
            let dir = entry.path();
            if !dir.join(SCHEMA_FILE).is_file() {
                continue;
            }
            let collection = load_collection(&dir)?;
            debug!(
                collection = %collection.state.schema.name,
                rows = collection.state.row_count,
                "Loaded collection"
            );
            collections.insert(collection.state.schema.name.clone(), collection);
        }

        info!(root = %root.display(), collections = collections.len(), "Opened local store");
        Ok(Self {
            root: Some(root),
            collections: RwLock::new(collections),
        })
    }

    /// Directory backing this store, if persisted.
    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

fn not_found(name: &str) -> StoreError {
    StoreError::CollectionNotFound {
        collection: name.to_string(),
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn corrupted(path: &Path, reason: impl Into<String>) -> StoreError {
    StoreError::Corrupted {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Collection names: a letter or underscore, then letters, digits, underscores.
fn validate_name(name: &str) -> StoreResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && name.len() <= 255 {
        Ok(())
    } else {
        Err(StoreError::InvalidRequest {
            reason: format!(
                "Invalid collection name '{name}': use letters, digits and underscores, starting with a letter or underscore"
            ),
        })
    }
}

fn write_state(dir: &Path, state: &CollectionState) -> StoreResult<()> {
    let path = dir.join(SCHEMA_FILE);
    let tmp = dir.join(format!("{SCHEMA_FILE}.tmp"));
    let json = serde_json::to_vec_pretty(state).map_err(|e| corrupted(&path, e.to_string()))?;
    fs::write(&tmp, json).map_err(io_err(&tmp))?;
    fs::rename(&tmp, &path).map_err(io_err(&path))
}

fn append_lines(dir: &Path, rows: &[Row]) -> StoreResult<()> {
    let path = dir.join(RECORDS_FILE);
    let mut buffer = Vec::new();
    for row in rows {
        let line = RowLine {
            id: row.id,
            path: row.record.path.clone(),
            modality: row.record.modality,
            content: row.record.content.clone(),
            metadata: row.record.metadata.clone(),
        };
        serde_json::to_writer(&mut buffer, &line).map_err(|e| corrupted(&path, e.to_string()))?;
        buffer.push(b'\n');
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_err(&path))?;
    file.write_all(&buffer).map_err(io_err(&path))?;
    file.flush().map_err(io_err(&path))
}

/// Writes a collection's files from scratch.
fn rewrite_files(dir: &Path, state: &CollectionState, rows: &[Row]) -> StoreResult<VectorSegment> {
    let mut segment = VectorSegment::create(dir.join(SEGMENT_FILE), state.schema.dimension)?;
    let entries: Vec<(u64, &[f32])> = rows
        .iter()
        .map(|row| (row.id, row.record.vector.as_slice()))
        .collect();
    segment.append(&entries)?;

    let records = dir.join(RECORDS_FILE);
    File::create(&records).map_err(io_err(&records))?;
    append_lines(dir, rows)?;
    write_state(dir, state)?;
    Ok(segment)
}

fn load_collection(dir: &Path) -> StoreResult<Collection> {
    let schema_path = dir.join(SCHEMA_FILE);
    let raw = fs::read(&schema_path).map_err(io_err(&schema_path))?;
    let state: CollectionState =
        serde_json::from_slice(&raw).map_err(|e| corrupted(&schema_path, e.to_string()))?;
    if state.format_version != FORMAT_VERSION {
        return Err(corrupted(
            &schema_path,
            format!(
                "unsupported format version {}, expected {FORMAT_VERSION}",
                state.format_version
            ),
        ));
    }

    let expected = state.row_count as usize;
    let segment = VectorSegment::open(dir.join(SEGMENT_FILE))?;
    if segment.dimension() != state.schema.dimension {
        return Err(corrupted(
            segment.path(),
            format!(
                "segment dimension {} does not match schema dimension {}",
                segment.dimension(),
                state.schema.dimension
            ),
        ));
    }
    let vectors = segment.read_all()?;
    if vectors.len() < expected {
        return Err(corrupted(
            segment.path(),
            format!("expected {expected} vectors, found {}", vectors.len()),
        ));
    }

    let records_path = dir.join(RECORDS_FILE);
    let file = File::open(&records_path).map_err(io_err(&records_path))?;
    let mut lines = Vec::with_capacity(expected);
    let mut orphaned_lines = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(io_err(&records_path))?;
        if lines.len() == expected {
            if !line.trim().is_empty() {
                orphaned_lines += 1;
            }
            continue;
        }
        let parsed: RowLine =
            serde_json::from_str(&line).map_err(|e| corrupted(&records_path, e.to_string()))?;
        lines.push(parsed);
    }
    if lines.len() < expected {
        return Err(corrupted(
            &records_path,
            format!("expected {expected} records, found {}", lines.len()),
        ));
    }

    let mut sealed = Vec::with_capacity(expected);
    for ((id, vector), line) in vectors.into_iter().take(expected).zip(lines) {
        if id != line.id {
            return Err(corrupted(
                &records_path,
                format!("vector id {id} does not match record id {}", line.id),
            ));
        }
        sealed.push(Row {
            id,
            record: ArtifactRecord {
                vector,
                path: line.path,
                modality: line.modality,
                content: line.content,
                metadata: line.metadata,
            },
        });
    }

    // Rows past the committed count belong to an interrupted flush
    let segment = if segment.count() > expected || orphaned_lines > 0 {
        warn!(
            dir = %dir.display(),
            orphaned_vectors = segment.count().saturating_sub(expected),
            orphaned_lines,
            "Rolling back partially flushed rows"
        );
        rewrite_files(dir, &state, &sealed)?
    } else {
        segment
    };

    Ok(Collection {
        state,
        sealed,
        pending: Vec::new(),
        files: Some(CollectionFiles {
            dir: dir.to_path_buf(),
            segment,
        }),
    })
}

impl VectorStore for LocalStore {
    fn backend_name(&self) -> &'static str {
        if self.root.is_some() { "local" } else { "memory" }
    }

    fn list_collections(&self) -> StoreResult<Vec<String>> {
        Ok(self.collections.read().keys().cloned().collect())
    }

    fn has_collection(&self, name: &str) -> StoreResult<bool> {
        Ok(self.collections.read().contains_key(name))
    }

    fn create_collection(&self, schema: CollectionSchema) -> StoreResult<()> {
        validate_name(&schema.name)?;
        let mut collections = self.collections.write();
        if collections.contains_key(&schema.name) {
            return Err(StoreError::CollectionExists {
                collection: schema.name,
            });
        }

        let now = Utc::now();
        let state = CollectionState {
            format_version: FORMAT_VERSION,
            schema,
            next_id: 1,
            row_count: 0,
            created_at: now,
            updated_at: now,
        };

        let files = match &self.root {
            Some(root) => {
                let dir = root.join(&state.schema.name);
                fs::create_dir_all(&dir).map_err(io_err(&dir))?;
                let segment = rewrite_files(&dir, &state, &[])?;
                Some(CollectionFiles { dir, segment })
            }
            None => None,
        };

        info!(
            collection = %state.schema.name,
            dimension = %state.schema.dimension,
            metric = %state.schema.metric,
            "Created collection"
        );
        collections.insert(
            state.schema.name.clone(),
            Collection {
                state,
                sealed: Vec::new(),
                pending: Vec::new(),
                files,
            },
        );
        Ok(())
    }

    fn drop_collection(&self, name: &str) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let collection = collections.remove(name).ok_or_else(|| not_found(name))?;
        if let Some(files) = collection.files {
            fs::remove_dir_all(&files.dir).map_err(io_err(&files.dir))?;
        }
        info!(collection = name, "Dropped collection");
        Ok(())
    }

    fn describe_collection(&self, name: &str) -> StoreResult<CollectionInfo> {
        self.collections
            .read()
            .get(name)
            .map(Collection::info)
            .ok_or_else(|| not_found(name))
    }

    fn insert(&self, name: &str, records: Vec<ArtifactRecord>) -> StoreResult<Vec<u64>> {
        let mut collections = self.collections.write();
        let collection = collections.get_mut(name).ok_or_else(|| not_found(name))?;

        let dimension = collection.state.schema.dimension.get();
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
            return Err(StoreError::DimensionMismatch {
                collection: name.to_string(),
                expected: dimension,
                actual: bad.vector.len(),
            });
        }

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = collection.state.next_id;
            collection.state.next_id += 1;
            collection.pending.push(Row { id, record });
            ids.push(id);
        }
        debug!(collection = name, count = ids.len(), "Buffered rows");
        Ok(ids)
    }

    fn flush(&self, name: &str) -> StoreResult<()> {
        let mut collections = self.collections.write();
        let collection = collections.get_mut(name).ok_or_else(|| not_found(name))?;
        if collection.pending.is_empty() {
            return Ok(());
        }

        let mut next_state = collection.state.clone();
        next_state.row_count += collection.pending.len() as u64;
        next_state.updated_at = Utc::now();

        if let Some(files) = collection.files.as_mut() {
            append_lines(&files.dir, &collection.pending)?;
            let entries: Vec<(u64, &[f32])> = collection
                .pending
                .iter()
                .map(|row| (row.id, row.record.vector.as_slice()))
                .collect();
            files.segment.append(&entries)?;
            write_state(&files.dir, &next_state)?;
        }

        let flushed = collection.pending.len();
        collection.state = next_state;
        let pending = std::mem::take(&mut collection.pending);
        collection.sealed.extend(pending);
        info!(
            collection = name,
            flushed,
            rows = collection.state.row_count,
            "Flushed collection"
        );
        Ok(())
    }

    fn row_count(&self, name: &str) -> StoreResult<u64> {
        self.collections
            .read()
            .get(name)
            .map(|c| c.state.row_count)
            .ok_or_else(|| not_found(name))
    }

    fn search(&self, request: &SearchRequest) -> StoreResult<Vec<Hit>> {
        if request.limit == 0 {
            return Err(StoreError::InvalidRequest {
                reason: "limit must be at least 1".to_string(),
            });
        }

        let collections = self.collections.read();
        let name = request.collection.as_str();
        let collection = collections.get(name).ok_or_else(|| not_found(name))?;
        let schema = &collection.state.schema;

        if request.vector_field != schema.vector_field {
            return Err(StoreError::UnknownField {
                collection: name.to_string(),
                field: request.vector_field.clone(),
            });
        }
        if request.metric != schema.metric {
            return Err(StoreError::MetricMismatch {
                collection: name.to_string(),
                expected: schema.metric,
                requested: request.metric,
            });
        }
        if request.vector.len() != schema.dimension.get() {
            return Err(StoreError::DimensionMismatch {
                collection: name.to_string(),
                expected: schema.dimension.get(),
                actual: request.vector.len(),
            });
        }

        let metric = schema.metric;
        let mut scored: Vec<(f32, &Row)> = collection
            .sealed
            .iter()
            .map(|row| (score(metric, &request.vector, &row.record.vector), row))
            .collect();

        // Ties keep insertion order
        scored.sort_by(|(sa, ra), (sb, rb)| {
            let by_score = if metric.higher_is_closer() {
                sb.total_cmp(sa)
            } else {
                sa.total_cmp(sb)
            };
            by_score.then(ra.id.cmp(&rb.id))
        });

        Ok(scored
            .into_iter()
            .take(request.limit)
            .map(|(score, row)| Hit {
                id: row.id,
                score: Some(score),
                fields: row.record.project(&request.output_fields),
            })
            .collect())
    }

    fn query(&self, query: &PatternQuery) -> StoreResult<Vec<Hit>> {
        if query.limit == 0 {
            return Err(StoreError::InvalidRequest {
                reason: "limit must be at least 1".to_string(),
            });
        }

        let collections = self.collections.read();
        let name = query.collection.as_str();
        let collection = collections.get(name).ok_or_else(|| not_found(name))?;

        Ok(collection
            .sealed
            .iter()
            .filter(|row| {
                row.record
                    .field_text(query.field)
                    .contains(query.substring.as_str())
            })
            .take(query.limit)
            .map(|row| Hit {
                id: row.id,
                score: None,
                fields: row.record.project(&query.output_fields),
            })
            .collect())
    }
}
