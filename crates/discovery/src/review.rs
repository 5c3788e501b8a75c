#![forbid(unsafe_code)]

use crate::metadata::FileMetadata;
use bitflags::bitflags;
use nix::sys::stat::Mode;
use nix::unistd::{Gid, Uid};
use std::fmt;

bitflags! {
    /// Outcome of a trust check. Every bit is an independent reason for
    /// refusing a path; the empty set means the path is trusted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TrustVerdict: u8 {
        const UNTRUSTED_OWNER = 1 << 0;
        const UNTRUSTED_GROUP = 1 << 1;
        const WORLD_WRITABLE = 1 << 2;
        const GROUP_WRITABLE = 1 << 3;
        /// Metadata could not be read at all. Never produced by
        /// [`StatReviewer::review`], only by callers that failed to fetch it.
        const IO_ERROR = 1 << 4;
    }
}

impl TrustVerdict {
    pub const TRUSTED: Self = Self::empty();

    pub const fn is_trusted(self) -> bool {
        self.is_empty()
    }
}

impl fmt::Display for TrustVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_trusted() {
            return f.write_str("trusted");
        }
        // an I/O failure subsumes everything else
        if self.contains(Self::IO_ERROR) {
            return f.write_str("metadata unavailable");
        }

        let reasons = [
            (Self::UNTRUSTED_OWNER, "not owned by the trusted user"),
            (Self::UNTRUSTED_GROUP, "not owned by the trusted group"),
            (Self::WORLD_WRITABLE, "world writable"),
            (Self::GROUP_WRITABLE, "group writable"),
        ];
        let mut first = true;
        for (flag, reason) in reasons {
            if self.contains(flag) {
                if !first {
                    f.write_str(", ")?;
                }
                f.write_str(reason)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Decides whether a single filesystem entry is administratively safe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatReviewer {
    owner: Uid,
    group: Gid,
}

impl StatReviewer {
    pub const fn new(owner: Uid, group: Gid) -> Self {
        Self { owner, group }
    }

    pub fn from_config(config: &config::Discovery) -> Self {
        Self::new(
            Uid::from_raw(config.trusted_owner),
            Gid::from_raw(config.trusted_group),
        )
    }

    pub fn owner(&self) -> Uid {
        self.owner
    }

    pub fn group(&self) -> Gid {
        self.group
    }

    /// Review a metadata snapshot. All violations are reported together.
    ///
    /// Permission bits of a symbolic link are not consulted: the kernel never
    /// enforces them and reports `0777` for every link. The link target is
    /// verified on its own by the caller.
    pub fn review(&self, metadata: &FileMetadata) -> TrustVerdict {
        let mut verdict = TrustVerdict::TRUSTED;

        if metadata.owner != self.owner {
            verdict |= TrustVerdict::UNTRUSTED_OWNER;
        }
        if metadata.group != self.group {
            verdict |= TrustVerdict::UNTRUSTED_GROUP;
        }
        if !metadata.is_symlink() {
            if metadata.mode.contains(Mode::S_IWOTH) {
                verdict |= TrustVerdict::WORLD_WRITABLE;
            }
            if metadata.mode.contains(Mode::S_IWGRP) {
                verdict |= TrustVerdict::GROUP_WRITABLE;
            }
        }
        // TODO: POSIX ACLs can grant write access without any mode bit set.

        verdict
    }
}
