#![forbid(unsafe_code)]

use crate::metadata::FileMetadata;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// Canonical paths already proven trusted during one discovery run.
///
/// Only the verifier inserts, and only after a fresh check passed. Failures
/// are never recorded, so a permission fix is picked up by the next check.
/// Symbolic links are never keys; their resolved targets are.
#[derive(Debug, Default)]
pub struct TrustCache {
    entries: FxHashMap<PathBuf, FileMetadata>,
}

impl TrustCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot that was verified for `path`, if any.
    pub fn get(&self, path: &Path) -> Option<&FileMetadata> {
        self.entries.get(path)
    }

    pub fn is_trusted(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    pub(crate) fn mark_trusted(&mut self, path: PathBuf, metadata: FileMetadata) {
        debug_assert!(!metadata.is_symlink(), "symlinks are never cached");
        self.entries.insert(path, metadata);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
