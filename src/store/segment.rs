//! Memory-mapped vector segment for one collection.
//!
//! # Storage Format
//!
//! - Header (16 bytes): magic `EVEC`, version, dimension, committed count
//! - Entries: `id: u64 LE` followed by `dimension` × `f32 LE`
//!
//! The header count is rewritten after every append, so bytes past the
//! committed count are the remains of an interrupted flush and are cut off
//! on open.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::MmapOptions;

use crate::error::{StoreError, StoreResult};
use crate::vector::VectorDimension;

/// Current segment format version.
const SEGMENT_VERSION: u32 = 1;

/// Size of the segment header in bytes.
const HEADER_SIZE: usize = 16;

/// Magic bytes identifying a vector segment.
const MAGIC_BYTES: &[u8; 4] = b"EVEC";

const BYTES_PER_F32: usize = 4;
const BYTES_PER_ID: usize = 8;

/// Append-only vector file.
#[derive(Debug)]
pub struct VectorSegment {
    path: PathBuf,
    dimension: VectorDimension,
    count: usize,
}

impl VectorSegment {
    /// Creates an empty segment, replacing any file at `path`.
    pub fn create(path: impl Into<PathBuf>, dimension: VectorDimension) -> StoreResult<Self> {
        let segment = Self {
            path: path.into(),
            dimension,
            count: 0,
        };
        let mut file = File::create(&segment.path).map_err(|e| segment.io(e))?;
        segment.write_header(&mut file)?;
        Ok(segment)
    }

    /// Opens an existing segment and validates its header.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let len = file
            .metadata()
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?
            .len() as usize;

        if len < HEADER_SIZE {
            return Err(corrupted(&path, "file too small to contain header"));
        }

        let mut header = [0u8; HEADER_SIZE];
        (&file)
            .read_exact(&mut header)
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;

        if &header[0..4] != MAGIC_BYTES {
            return Err(corrupted(&path, "invalid magic bytes"));
        }
        let version = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        if version != SEGMENT_VERSION {
            return Err(corrupted(
                &path,
                &format!("unsupported segment version {version}, expected {SEGMENT_VERSION}"),
            ));
        }
        let dim = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
        let dimension =
            VectorDimension::new(dim).map_err(|e| corrupted(&path, &e.to_string()))?;
        let count = u32::from_le_bytes([header[12], header[13], header[14], header[15]]) as usize;

        let segment = Self {
            path,
            dimension,
            count,
        };

        let committed = segment.committed_len();
        if len < committed {
            return Err(corrupted(
                &segment.path,
                &format!("header claims {count} vectors but file holds {len} bytes"),
            ));
        }
        if len > committed {
            tracing::warn!(
                path = %segment.path.display(),
                extra = len - committed,
                "Discarding uncommitted bytes at end of segment"
            );
            let file = OpenOptions::new()
                .write(true)
                .open(&segment.path)
                .map_err(|e| segment.io(e))?;
            file.set_len(committed as u64).map_err(|e| segment.io(e))?;
        }

        Ok(segment)
    }

    /// Appends entries, then commits the new count to the header.
    pub fn append(&mut self, entries: &[(u64, &[f32])]) -> StoreResult<()> {
        if entries.is_empty() {
            return Ok(());
        }
        for (_, vector) in entries {
            self.dimension
                .validate_vector(vector)
                .map_err(|e| corrupted(&self.path, &e.to_string()))?;
        }

        let mut buffer = Vec::with_capacity(entries.len() * self.entry_size());
        for (id, vector) in entries {
            buffer.extend_from_slice(&id.to_le_bytes());
            for value in *vector {
                buffer.extend_from_slice(&value.to_le_bytes());
            }
        }

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io(e))?;
        file.write_all(&buffer).map_err(|e| self.io(e))?;
        file.flush().map_err(|e| self.io(e))?;

        self.count += entries.len();
        self.write_count()
    }

    /// Reads every committed entry through a memory map.
    pub fn read_all(&self) -> StoreResult<Vec<(u64, Vec<f32>)>> {
        if self.count == 0 {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).map_err(|e| self.io(e))?;
        // SAFETY: the file is owned by this store and only appended to
        // while the collection lock is held.
        let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(|e| self.io(e))?;
        if mmap.len() < self.committed_len() {
            return Err(corrupted(&self.path, "segment shorter than committed count"));
        }

        let dimension = self.dimension.get();
        let entry_size = self.entry_size();
        let mut entries = Vec::with_capacity(self.count);

        for index in 0..self.count {
            let offset = HEADER_SIZE + index * entry_size;
            let mut id_bytes = [0u8; BYTES_PER_ID];
            id_bytes.copy_from_slice(&mmap[offset..offset + BYTES_PER_ID]);
            let id = u64::from_le_bytes(id_bytes);

            let data = &mmap[offset + BYTES_PER_ID..offset + entry_size];
            let vector = data
                .chunks_exact(BYTES_PER_F32)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect::<Vec<_>>();
            debug_assert_eq!(vector.len(), dimension);

            entries.push((id, vector));
        }

        Ok(entries)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entry_size(&self) -> usize {
        BYTES_PER_ID + self.dimension.get() * BYTES_PER_F32
    }

    fn committed_len(&self) -> usize {
        HEADER_SIZE + self.count * self.entry_size()
    }

    fn write_header(&self, file: &mut File) -> StoreResult<()> {
        let mut header = Vec::with_capacity(HEADER_SIZE);
        header.extend_from_slice(MAGIC_BYTES);
        header.extend_from_slice(&SEGMENT_VERSION.to_le_bytes());
        header.extend_from_slice(&(self.dimension.get() as u32).to_le_bytes());
        header.extend_from_slice(&(self.count as u32).to_le_bytes());
        file.write_all(&header).map_err(|e| self.io(e))?;
        file.flush().map_err(|e| self.io(e))
    }

    fn write_count(&self) -> StoreResult<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .map_err(|e| self.io(e))?;
        // Count lives at byte offset 12
        file.seek(SeekFrom::Start(12)).map_err(|e| self.io(e))?;
        file.write_all(&(self.count as u32).to_le_bytes())
            .map_err(|e| self.io(e))?;
        file.flush().map_err(|e| self.io(e))
    }

    fn io(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

fn corrupted(path: &Path, reason: &str) -> StoreError {
    StoreError::Corrupted {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn dim(n: usize) -> VectorDimension {
        VectorDimension::new(n).unwrap()
    }

    #[test]
    fn test_create_append_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vectors.seg");

        let mut segment = VectorSegment::create(&path, dim(3)).unwrap();
        assert_eq!(segment.count(), 0);
        assert!(segment.read_all().unwrap().is_empty());

        let a = [0.1, 0.2, 0.3];
        let b = [1.0, 0.0, -1.0];
        segment.append(&[(1, &a[..]), (2, &b[..])]).unwrap();
        segment.append(&[(7, &a[..])]).unwrap();
        assert_eq!(segment.count(), 3);

        let reopened = VectorSegment::open(&path).unwrap();
        assert_eq!(reopened.dimension().get(), 3);
        let entries = reopened.read_all().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, 1);
        assert_eq!(entries[1].1, vec![1.0, 0.0, -1.0]);
        assert_eq!(entries[2].0, 7);
    }

    #[test]
    fn test_dimension_is_validated() {
        let temp_dir = TempDir::new().unwrap();
        let mut segment = VectorSegment::create(temp_dir.path().join("v.seg"), dim(4)).unwrap();
        let short = [1.0, 2.0];
        assert!(segment.append(&[(1, &short[..])]).is_err());
        assert_eq!(segment.count(), 0);
    }

    #[test]
    fn test_uncommitted_tail_is_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vectors.seg");
        let mut segment = VectorSegment::create(&path, dim(2)).unwrap();
        segment.append(&[(1, &[0.5, 0.5][..])]).unwrap();

        // Simulate a crash between the data write and the header update
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xAB; 11]).unwrap();
        drop(file);

        let reopened = VectorSegment::open(&path).unwrap();
        assert_eq!(reopened.count(), 1);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len() as usize,
            HEADER_SIZE + BYTES_PER_ID + 2 * BYTES_PER_F32
        );
    }

    #[test]
    fn test_bad_magic_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("vectors.seg");
        std::fs::write(&path, b"NOPE0000000000000000").unwrap();
        let err = VectorSegment::open(&path).unwrap_err();
        assert_eq!(err.status_code(), "STORE_CORRUPTED");
    }
}
