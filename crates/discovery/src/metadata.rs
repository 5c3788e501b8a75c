#![forbid(unsafe_code)]

use nix::sys::stat::{FileStat, Mode, SFlag};
use nix::unistd::{Gid, Uid};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Regular,
    Directory,
    Symlink,
    /// Devices, sockets, fifos.
    Other,
}

/// Device and inode pair. Stable for the lifetime of a file, so a loader can
/// tell whether the file it opens is the one that was verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileIdentity {
    pub device: u64,
    pub inode: u64,
}

/// Snapshot of the attributes the trust checks look at, taken once per path
/// component with `lstat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub owner: Uid,
    pub group: Gid,
    pub mode: Mode,
    pub kind: FileKind,
    pub modified: SystemTime,
    pub identity: FileIdentity,
}

impl FileMetadata {
    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

impl From<FileStat> for FileMetadata {
    fn from(stat: FileStat) -> Self {
        let format = SFlag::from_bits_truncate(stat.st_mode) & SFlag::S_IFMT;
        let kind = if format == SFlag::S_IFREG {
            FileKind::Regular
        } else if format == SFlag::S_IFDIR {
            FileKind::Directory
        } else if format == SFlag::S_IFLNK {
            FileKind::Symlink
        } else {
            FileKind::Other
        };

        Self {
            owner: Uid::from_raw(stat.st_uid),
            group: Gid::from_raw(stat.st_gid),
            mode: Mode::from_bits_truncate(stat.st_mode),
            kind,
            modified: system_time(i64::from(stat.st_mtime), i64::from(stat.st_mtime_nsec)),
            identity: FileIdentity {
                device: u64::from(stat.st_dev),
                inode: u64::from(stat.st_ino),
            },
        }
    }
}

fn system_time(secs: i64, nsecs: i64) -> SystemTime {
    let nanos = Duration::from_nanos(nsecs.clamp(0, 999_999_999) as u64);
    let base = if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    };
    base + nanos
}

/// Where the verifier gets filesystem facts from.
pub trait MetadataSource {
    /// Metadata of `path` itself. A final symbolic link is not followed.
    fn symlink_metadata(&self, path: &Path) -> io::Result<FileMetadata>;

    /// Target of the symbolic link at `path`, exactly as stored in the link.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;
}

impl<T: MetadataSource + ?Sized> MetadataSource for &T {
    fn symlink_metadata(&self, path: &Path) -> io::Result<FileMetadata> {
        (**self).symlink_metadata(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        (**self).read_link(path)
    }
}

/// The real filesystem, via `lstat(2)` and `readlink(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMetadata;

impl MetadataSource for SystemMetadata {
    fn symlink_metadata(&self, path: &Path) -> io::Result<FileMetadata> {
        let stat = nix::sys::stat::lstat(path)?;
        Ok(stat.into())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        let target = nix::fcntl::readlink(path)?;
        Ok(PathBuf::from(target))
    }
}
