#![forbid(unsafe_code)]

use crate::cache::TrustCache;
use crate::candidate::{DiscoveryResult, ModuleFileCandidate};
use crate::error::DiscoveryError;
use crate::metadata::{FileKind, MetadataSource, SystemMetadata};
use crate::verifier::PathTrustVerifier;
use rustc_hash::FxHashSet;
use std::ffi::OsStr;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::{debug, info, trace};
use walkdir::WalkDir;

/// Finds module files under a directory, admitting only those whose whole
/// path chain is trusted.
#[derive(Debug, Clone)]
pub struct ModuleDiscoveryWalker<M = SystemMetadata> {
    verifier: PathTrustVerifier<M>,
    suffix: String,
}

impl ModuleDiscoveryWalker<SystemMetadata> {
    pub fn new(config: &config::Discovery) -> Self {
        Self::with_source(config, SystemMetadata)
    }
}

impl<M: MetadataSource> ModuleDiscoveryWalker<M> {
    pub fn with_source(config: &config::Discovery, source: M) -> Self {
        Self::from_parts(
            PathTrustVerifier::with_source(config, source),
            config.suffix.clone(),
        )
    }

    pub fn from_parts(verifier: PathTrustVerifier<M>, suffix: impl Into<String>) -> Self {
        Self {
            verifier,
            suffix: suffix.into(),
        }
    }

    pub fn verifier(&self) -> &PathTrustVerifier<M> {
        &self.verifier
    }

    /// Walk `root`, following symbolic links, and collect every trusted
    /// module file.
    ///
    /// Directories are verified too, even when no module lives in them. Any
    /// failure aborts the whole run: no module is returned unless every
    /// visited entry verified.
    pub fn discover(&self, root: impl AsRef<Path>) -> Result<DiscoveryResult, DiscoveryError> {
        let root = root.as_ref();
        let mut cache = TrustCache::new();
        let mut seen = FxHashSet::default();
        let mut candidates = Vec::new();

        let walker = WalkDir::new(root).follow_links(true).sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if is_dangling_link(&err) => {
                    debug!(path = ?err.path(), "not considering dangling symbolic link");
                    continue;
                }
                Err(err) if err.loop_ancestor().is_some() => {
                    // the ancestor was verified when the walk entered it
                    debug!(
                        path = ?err.path(),
                        ancestor = ?err.loop_ancestor(),
                        "not following directory cycle"
                    );
                    continue;
                }
                Err(err) => {
                    let path = err.path().unwrap_or(root).to_path_buf();
                    return Err(DiscoveryError::Traversal { path, source: err });
                }
            };
            let path = entry.path();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                // beyond the checks, nothing is done with directories
                self.verifier.verify(path, &mut cache)?;
                trace!(?path, "directory verified");
                continue;
            }
            if !file_type.is_file() {
                debug!(?path, "not considering module in non-file");
                continue;
            }
            if !self.matches_suffix(entry.file_name()) {
                info!(?path, suffix = %self.suffix, "not loading file: bad extension");
                continue;
            }

            let verified = self.verifier.verify(path, &mut cache)?;
            if verified.metadata.kind != FileKind::Regular {
                return Err(DiscoveryError::Changed {
                    path: verified.path,
                });
            }
            if !seen.insert(verified.path.clone()) {
                debug!(?path, canonical = ?verified.path, "module already found through another path");
                continue;
            }
            debug!(?path, canonical = ?verified.path, "module file accepted");
            candidates.push(ModuleFileCandidate::new(verified.path, &verified.metadata));
        }

        debug!(
            ?root,
            modules = candidates.len(),
            cached = cache.len(),
            "module discovery finished"
        );
        Ok(DiscoveryResult::from(candidates))
    }

    fn matches_suffix(&self, name: &OsStr) -> bool {
        name.as_bytes().ends_with(self.suffix.as_bytes())
    }
}

/// A link whose target does not exist is neither a file nor a directory.
fn is_dangling_link(err: &walkdir::Error) -> bool {
    if err.loop_ancestor().is_some() {
        return false;
    }
    let not_found = err
        .io_error()
        .is_some_and(|io| io.kind() == io::ErrorKind::NotFound);
    not_found
        && err
            .path()
            .and_then(|path| path.symlink_metadata().ok())
            .is_some_and(|metadata| metadata.file_type().is_symlink())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_match_is_exact_and_case_sensitive() {
        let walker = ModuleDiscoveryWalker::new(&config::Discovery::default());

        assert!(walker.matches_suffix(OsStr::new("cpu.irkmod")));
        assert!(walker.matches_suffix(OsStr::new(".irkmod")));
        assert!(!walker.matches_suffix(OsStr::new("cpu.IRKMOD")));
        assert!(!walker.matches_suffix(OsStr::new("cpu.irkmod.bak")));
        assert!(!walker.matches_suffix(OsStr::new("plugin.so")));
        assert!(!walker.matches_suffix(OsStr::new("irkmod")));
    }
}
