//! Deterministic traversal of an evidence tree.
//!
//! Unlike a source-code walker this one applies no ignore rules: hidden
//! files, dot-directories and anything a `.gitignore` would exclude are all
//! potential evidence.

use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::types::ArtifactKind;

/// Walks a directory tree and yields regular files in sorted order.
#[derive(Debug, Clone, Default)]
pub struct ArtifactWalker {
    follow_links: bool,
}

impl ArtifactWalker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follow symbolic links while walking (off by default).
    #[must_use]
    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Every regular file under `root`, depth-first, sorted by name.
    ///
    /// Entries that cannot be read are logged and skipped.
    pub fn walk(&self, root: &Path) -> impl Iterator<Item = PathBuf> + use<> {
        WalkDir::new(root)
            .follow_links(self.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {e}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
    }

    /// Counts files per kind without reading them (dry runs).
    pub fn classify_counts(&self, root: &Path) -> KindCounts {
        let mut counts = KindCounts::default();
        for path in self.walk(root) {
            match ArtifactKind::classify(&path) {
                ArtifactKind::Image => counts.images += 1,
                ArtifactKind::Text => counts.texts += 1,
                ArtifactKind::Unsupported => counts.unsupported += 1,
            }
        }
        counts
    }
}

/// Files per artifact kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindCounts {
    pub images: usize,
    pub texts: usize,
    pub unsupported: usize,
}

impl KindCounts {
    pub fn total(&self) -> usize {
        self.images + self.texts + self.unsupported
    }
}
