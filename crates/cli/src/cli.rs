use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::path::{Path, PathBuf};

/// irkd: the system monitoring daemon
///
/// irkd loads data-collector modules from a module directory. A module is
/// only accepted when every directory from `/` down to the module file, and
/// every symbolic link on the way, is owned by the trusted user and group and
/// is not writable by anyone else. A single violation anywhere in the tree
/// stops all modules from loading.
#[derive(Debug, Parser, Clone)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Path to configuration file.
    ///
    /// If not provided, the default locations are checked. They are
    /// `/etc/irk/config.toml` and `/etc/irk/config.d/*.toml`, where the
    /// latter being a glob pattern. If they don't exist, the default
    /// configuration is used.
    #[arg(short, long, value_parser = validate_file)]
    pub conffile: Option<PathBuf>,

    /// Directory to discover modules in. Overrides the configuration.
    #[arg(short, long)]
    pub module_dir: Option<PathBuf>,

    /// Discover modules once, report them and exit.
    #[arg(long)]
    pub once: bool,

    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,
}

/// Check if the file exists.
#[inline(always)]
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = Path::new(file);
    if path.is_file() {
        Ok(path.to_owned())
    } else {
        Err(format!("File not found: {:?}", path))
    }
}
