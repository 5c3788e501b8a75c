use crate::review::TrustVerdict;
use std::io;
use std::path::{Path, PathBuf};

/// Why a path failed verification. Every variant names the component that
/// failed, which is not necessarily the path that was asked about.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    #[error("{path:?} is not secure: {verdict}")]
    Untrusted { path: PathBuf, verdict: TrustVerdict },

    #[error("Unable to read metadata of {path:?}: {source}")]
    MetadataUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Too many levels of symbolic links while resolving {path:?}")]
    SymlinkCycle { path: PathBuf },
}

impl TrustError {
    pub fn path(&self) -> &Path {
        match self {
            Self::Untrusted { path, .. }
            | Self::MetadataUnavailable { path, .. }
            | Self::SymlinkCycle { path } => path,
        }
    }

    pub fn verdict(&self) -> TrustVerdict {
        match self {
            Self::Untrusted { verdict, .. } => *verdict,
            Self::MetadataUnavailable { .. } | Self::SymlinkCycle { .. } => TrustVerdict::IO_ERROR,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error("Unable to traverse modules directory {path:?}: {source}")]
    Traversal {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("{path:?} changed type while it was being verified")]
    Changed { path: PathBuf },
}

impl DiscoveryError {
    /// Path to show in the audit log.
    pub fn path(&self) -> &Path {
        match self {
            Self::Trust(err) => err.path(),
            Self::Traversal { path, .. } | Self::Changed { path } => path,
        }
    }

    pub fn verdict(&self) -> TrustVerdict {
        match self {
            Self::Trust(err) => err.verdict(),
            Self::Traversal { .. } | Self::Changed { .. } => TrustVerdict::IO_ERROR,
        }
    }
}
