#![forbid(unsafe_code)]

//! Verification of a whole path chain, from `/` down to the final component.
//!
//! Every component is `lstat`ed and reviewed. A component that is a symbolic
//! link is resolved with `readlink` and its target, made absolute against
//! the already verified parent, is verified from `/` again. The canonical
//! prefix is tracked by hand, so resolution never changes the process
//! working directory and concurrent verifications do not interfere.

use crate::cache::TrustCache;
use crate::error::TrustError;
use crate::metadata::{FileMetadata, MetadataSource, SystemMetadata};
use crate::review::{StatReviewer, TrustVerdict};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, trace};

/// A path that passed verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    /// Absolute path with every symbolic link resolved.
    pub path: PathBuf,
    /// Snapshot of the final component, as it was reviewed.
    pub metadata: FileMetadata,
}

#[derive(Debug, Clone)]
pub struct PathTrustVerifier<M = SystemMetadata> {
    reviewer: StatReviewer,
    source: M,
    max_symlink_hops: u32,
}

impl PathTrustVerifier<SystemMetadata> {
    pub fn new(config: &config::Discovery) -> Self {
        Self::with_source(config, SystemMetadata)
    }
}

impl<M: MetadataSource> PathTrustVerifier<M> {
    pub fn with_source(config: &config::Discovery, source: M) -> Self {
        Self::from_parts(
            StatReviewer::from_config(config),
            source,
            config.max_symlink_hops,
        )
    }

    pub fn from_parts(reviewer: StatReviewer, source: M, max_symlink_hops: u32) -> Self {
        Self {
            reviewer,
            source,
            max_symlink_hops,
        }
    }

    pub fn reviewer(&self) -> &StatReviewer {
        &self.reviewer
    }

    /// Verify `path` and every ancestor of it.
    ///
    /// Fails on the first component that is not trusted; components after it
    /// are not looked at. Components found in `cache` are not fetched again,
    /// and every non-link component that passes is added to it.
    pub fn verify(
        &self,
        path: impl AsRef<Path>,
        cache: &mut TrustCache,
    ) -> Result<Verified, TrustError> {
        let mut hops = 0;
        self.resolve(path.as_ref(), cache, &mut hops)
    }

    /// Like [`verify`](Self::verify), reduced to the verdict.
    pub fn check(&self, path: impl AsRef<Path>, cache: &mut TrustCache) -> TrustVerdict {
        match self.verify(path, cache) {
            Ok(_) => TrustVerdict::TRUSTED,
            Err(err) => {
                debug!(%err, "path failed trust verification");
                err.verdict()
            }
        }
    }

    fn resolve(
        &self,
        path: &Path,
        cache: &mut TrustCache,
        hops: &mut u32,
    ) -> Result<Verified, TrustError> {
        let path =
            std::path::absolute(path).map_err(|source| TrustError::MetadataUnavailable {
                path: path.to_path_buf(),
                source,
            })?;

        // `/` is checked like any other directory
        let mut current = self.component(PathBuf::from("/"), cache, hops)?;
        for component in path.components() {
            match component {
                Component::Prefix(_) | Component::RootDir | Component::CurDir => {}
                Component::ParentDir => {
                    let mut parent = current.path;
                    parent.pop();
                    current = self.component(parent, cache, hops)?;
                }
                Component::Normal(name) => {
                    let next = current.path.join(name);
                    current = self.component(next, cache, hops)?;
                }
            }
        }
        Ok(current)
    }

    /// Verify one component whose parent is already verified and canonical.
    fn component(
        &self,
        path: PathBuf,
        cache: &mut TrustCache,
        hops: &mut u32,
    ) -> Result<Verified, TrustError> {
        if let Some(metadata) = cache.get(&path) {
            trace!(?path, "found in trust cache, skipping checks");
            let metadata = metadata.clone();
            return Ok(Verified { path, metadata });
        }

        let metadata = match self.source.symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(source) => {
                debug!(?path, %source, "unable to stat path component");
                return Err(TrustError::MetadataUnavailable { path, source });
            }
        };

        let verdict = self.reviewer.review(&metadata);
        if !verdict.is_trusted() {
            debug!(?path, %verdict, "path component is not secure");
            return Err(TrustError::Untrusted { path, verdict });
        }

        if !metadata.is_symlink() {
            trace!(?path, "caching trusted path component");
            cache.mark_trusted(path.clone(), metadata.clone());
            return Ok(Verified { path, metadata });
        }

        *hops += 1;
        if *hops > self.max_symlink_hops {
            debug!(?path, hops = *hops, "symbolic link budget exhausted");
            return Err(TrustError::SymlinkCycle { path });
        }

        let target = self
            .source
            .read_link(&path)
            .map_err(|source| TrustError::MetadataUnavailable {
                path: path.clone(),
                source,
            })?;
        // joining an absolute target replaces the parent entirely
        let target = match path.parent() {
            Some(parent) => parent.join(target),
            None => target,
        };
        debug!(link = ?path, ?target, "resolving symbolic link");
        self.resolve(&target, cache, hops)
    }
}
