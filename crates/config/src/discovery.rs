use crate::Error;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default location module files are loaded from.
pub const DEFAULT_MODULE_DIR: &str = "/usr/lib/irk/modules";

/// Default literal suffix a module file name must end with.
pub const DEFAULT_MODULE_SUFFIX: &str = ".irkmod";

/// Default bound on symbolic links followed while verifying one path. Same
/// value as the kernel's `MAXSYMLINKS`.
pub const DEFAULT_MAX_SYMLINK_HOPS: u32 = 40;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Discovery {
    /// Directory tree that is walked for module files. Symbolic links inside
    /// it are followed, and every link target has to pass the same ownership
    /// checks as the tree itself.
    pub module_dir: PathBuf,

    /// Only regular files whose name ends with this exact, case-sensitive
    /// suffix are considered modules. Anything else found in the module
    /// directory is ignored.
    ///
    /// # Note
    ///
    /// The suffix keeps the daemon from loading an unrelated shared library
    /// that happens to live in the same tree.
    pub suffix: String,

    /// User id that must own every directory from `/` down to each module
    /// file. Conventionally the superuser.
    pub trusted_owner: u32,

    /// Group id that must own every directory from `/` down to each module
    /// file. Conventionally the superuser's group.
    pub trusted_group: u32,

    /// Maximum number of symbolic links followed while verifying a single
    /// path. Exceeding it is treated as a symlink cycle.
    pub max_symlink_hops: u32,
}

impl Discovery {
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.suffix.is_empty() || self.suffix.contains('/') || self.suffix.contains('\0') {
            return Err(Error::InvalidSuffix(self.suffix.clone()));
        }
        if self.max_symlink_hops == 0 {
            return Err(Error::InvalidSymlinkHops);
        }
        Ok(())
    }
}

impl Default for Discovery {
    fn default() -> Self {
        Self {
            module_dir: PathBuf::from(DEFAULT_MODULE_DIR),
            suffix: DEFAULT_MODULE_SUFFIX.to_string(),
            trusted_owner: 0,
            trusted_group: 0,
            max_symlink_hops: DEFAULT_MAX_SYMLINK_HOPS,
        }
    }
}
