#![forbid(unsafe_code)]

use crate::metadata::{FileIdentity, FileMetadata};
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A module file whose whole path chain was verified. Handed to the loader
/// as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleFileCandidate {
    /// Canonical path of the module file.
    pub path: PathBuf,
    /// Lets the loader confirm that the file it opens is the verified one.
    pub identity: FileIdentity,
    pub modified: SystemTime,
}

impl ModuleFileCandidate {
    /// Build a candidate from the snapshot the file was verified with.
    pub fn new(path: PathBuf, metadata: &FileMetadata) -> Self {
        Self {
            path,
            identity: metadata.identity,
            modified: metadata.modified,
        }
    }

    /// Same file with the same contents, as far as inode and mtime can tell.
    pub fn is_unchanged(&self, other: &Self) -> bool {
        self.identity == other.identity && self.modified == other.modified
    }
}

/// Every module found by one discovery run, in traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryResult {
    candidates: Vec<ModuleFileCandidate>,
}

impl DiscoveryResult {
    pub fn candidates(&self) -> &[ModuleFileCandidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ModuleFileCandidate> {
        self.candidates.iter()
    }

    pub fn get(&self, path: &Path) -> Option<&ModuleFileCandidate> {
        self.candidates.iter().find(|c| c.path == path)
    }

    /// Compare against the modules accepted by an earlier run.
    pub fn diff(&self, previous: &DiscoveryResult) -> ModuleDiff {
        let before: FxHashMap<&Path, &ModuleFileCandidate> = previous
            .iter()
            .map(|candidate| (candidate.path.as_path(), candidate))
            .collect();
        let now: FxHashSet<&Path> = self.iter().map(|c| c.path.as_path()).collect();

        let mut diff = ModuleDiff::default();
        for candidate in self.iter() {
            match before.get(candidate.path.as_path()) {
                None => diff.added.push(candidate.clone()),
                Some(old) if !old.is_unchanged(candidate) => diff.modified.push(candidate.clone()),
                Some(_) => {}
            }
        }
        diff.removed = previous
            .iter()
            .filter(|candidate| !now.contains(candidate.path.as_path()))
            .cloned()
            .collect();
        diff
    }
}

impl From<Vec<ModuleFileCandidate>> for DiscoveryResult {
    fn from(candidates: Vec<ModuleFileCandidate>) -> Self {
        Self { candidates }
    }
}

impl IntoIterator for DiscoveryResult {
    type Item = ModuleFileCandidate;
    type IntoIter = std::vec::IntoIter<ModuleFileCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.into_iter()
    }
}

impl<'a> IntoIterator for &'a DiscoveryResult {
    type Item = &'a ModuleFileCandidate;
    type IntoIter = std::slice::Iter<'a, ModuleFileCandidate>;

    fn into_iter(self) -> Self::IntoIter {
        self.candidates.iter()
    }
}

/// Changes between two discovery runs, e.g. across a reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleDiff {
    pub added: Vec<ModuleFileCandidate>,
    pub removed: Vec<ModuleFileCandidate>,
    /// Same path, but a different inode or modification time.
    pub modified: Vec<ModuleFileCandidate>,
}

impl ModuleDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}
