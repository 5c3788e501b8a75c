#![forbid(unsafe_code)]

//! Trust-verified discovery of loadable module files.
//!
//! [`ModuleDiscoveryWalker`] walks a module directory and hands every entry
//! to [`PathTrustVerifier`], which checks each component from `/` down with
//! [`StatReviewer`], resolving symbolic links on the way. A module file is
//! only returned when its entire path chain is owned by the trusted user and
//! group and is not group or world writable.

mod cache;
mod candidate;
mod error;
mod metadata;
mod review;
mod verifier;
mod walker;

pub use cache::TrustCache;
pub use candidate::{DiscoveryResult, ModuleDiff, ModuleFileCandidate};
pub use error::{DiscoveryError, TrustError};
pub use metadata::{FileIdentity, FileKind, FileMetadata, MetadataSource, SystemMetadata};
pub use review::{StatReviewer, TrustVerdict};
pub use verifier::{PathTrustVerifier, Verified};
pub use walker::ModuleDiscoveryWalker;
