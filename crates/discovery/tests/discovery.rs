#![forbid(unsafe_code)]

use discovery::{
    DiscoveryError, FileIdentity, FileKind, FileMetadata, MetadataSource, ModuleDiscoveryWalker,
    SystemMetadata, TrustError, TrustVerdict,
};
use nix::sys::stat::Mode;
use nix::unistd::{Gid, Uid};
use pretty_assertions::assert_eq;
use std::fs::{self, Permissions};
use std::io;
use std::os::unix::fs::{MetadataExt, PermissionsExt, symlink};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tempfile::{TempDir, tempdir};

/// Real metadata below the given roots, a trusted directory everywhere else.
///
/// Test trees live in a temporary directory whose ancestors (`/tmp` and
/// friends) are world writable and cannot be fixed without privileges.
#[derive(Debug)]
struct Scoped {
    roots: Vec<PathBuf>,
    owner: u32,
    group: u32,
}

impl MetadataSource for Scoped {
    fn symlink_metadata(&self, path: &Path) -> io::Result<FileMetadata> {
        if self.roots.iter().any(|root| path.starts_with(root)) {
            return SystemMetadata.symlink_metadata(path);
        }
        Ok(FileMetadata {
            owner: Uid::from_raw(self.owner),
            group: Gid::from_raw(self.group),
            mode: Mode::from_bits_truncate(0o755),
            kind: FileKind::Directory,
            modified: UNIX_EPOCH,
            identity: FileIdentity {
                device: 0,
                inode: 0,
            },
        })
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        SystemMetadata.read_link(path)
    }
}

struct Tree {
    _dir: TempDir,
    root: PathBuf,
    uid: u32,
    gid: u32,
}

impl Tree {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::set_permissions(&root, Permissions::from_mode(0o755)).unwrap();
        let metadata = fs::metadata(&root).unwrap();
        Self {
            _dir: dir,
            root,
            uid: metadata.uid(),
            gid: metadata.gid(),
        }
    }

    fn dir(&self, rel: &str, mode: u32) -> PathBuf {
        let path = self.root.join(rel);
        fs::create_dir_all(&path).unwrap();
        fs::set_permissions(&path, Permissions::from_mode(mode)).unwrap();
        path
    }

    fn file(&self, rel: &str, mode: u32) -> PathBuf {
        let path = self.root.join(rel);
        fs::write(&path, b"module").unwrap();
        fs::set_permissions(&path, Permissions::from_mode(mode)).unwrap();
        path
    }

    fn link(&self, rel: &str, target: impl AsRef<Path>) -> PathBuf {
        let path = self.root.join(rel);
        symlink(target, &path).unwrap();
        path
    }

    fn config(&self) -> config::Discovery {
        config::Discovery {
            module_dir: self.root.clone(),
            trusted_owner: self.uid,
            trusted_group: self.gid,
            ..config::Discovery::default()
        }
    }

    fn walker(&self, others: &[&Tree]) -> ModuleDiscoveryWalker<Scoped> {
        self.walker_with(self.config(), others)
    }

    fn walker_with(
        &self,
        config: config::Discovery,
        others: &[&Tree],
    ) -> ModuleDiscoveryWalker<Scoped> {
        let mut roots = vec![self.root.clone()];
        roots.extend(others.iter().map(|tree| tree.root.clone()));
        let source = Scoped {
            roots,
            owner: config.trusted_owner,
            group: config.trusted_group,
        };
        ModuleDiscoveryWalker::with_source(&config, source)
    }
}

fn paths(result: &discovery::DiscoveryResult) -> Vec<PathBuf> {
    result.iter().map(|c| c.path.clone()).collect()
}

#[test]
fn only_suffix_matches_are_candidates() {
    let tree = Tree::new();
    tree.file("plugin.so", 0o644);
    let module = tree.file("plugin.irkmod", 0o644);
    tree.file("README", 0o644);
    tree.dir("net", 0o755);
    let nested = tree.file("net/iface.irkmod", 0o755);

    let result = tree.walker(&[]).discover(&tree.root).unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(paths(&result), vec![nested, module.clone()]);

    let std_meta = fs::metadata(&module).unwrap();
    let candidate = result.get(&module).unwrap();
    assert_eq!(candidate.identity.inode, std_meta.ino());
    assert_eq!(candidate.identity.device, std_meta.dev());
    assert_eq!(candidate.modified, std_meta.modified().unwrap());
}

#[test]
fn empty_directory_yields_nothing() {
    let tree = Tree::new();
    tree.dir("empty", 0o755);

    let result = tree.walker(&[]).discover(&tree.root).unwrap();
    assert!(result.is_empty());
}

#[test]
fn world_writable_directory_aborts_discovery() {
    let tree = Tree::new();
    tree.file("a.irkmod", 0o644);
    let evil = tree.dir("evil", 0o755);
    tree.file("evil/b.irkmod", 0o644);
    fs::set_permissions(&evil, Permissions::from_mode(0o777)).unwrap();

    let err = tree.walker(&[]).discover(&tree.root).unwrap_err();

    assert_eq!(err.path(), evil.as_path());
    assert!(err.verdict().contains(TrustVerdict::WORLD_WRITABLE));
    assert!(err.verdict().contains(TrustVerdict::GROUP_WRITABLE));
}

#[test]
fn untrusted_directory_without_modules_still_aborts() {
    let tree = Tree::new();
    tree.file("a.irkmod", 0o644);
    let loose = tree.dir("loose", 0o775);

    let err = tree.walker(&[]).discover(&tree.root).unwrap_err();

    assert_eq!(err.path(), loose.as_path());
    assert_eq!(err.verdict(), TrustVerdict::GROUP_WRITABLE);
}

#[test]
fn writable_module_file_aborts_discovery() {
    let tree = Tree::new();
    let module = tree.file("cpu.irkmod", 0o646);

    let err = tree.walker(&[]).discover(&tree.root).unwrap_err();

    assert!(matches!(
        err,
        DiscoveryError::Trust(TrustError::Untrusted { .. })
    ));
    assert_eq!(err.path(), module.as_path());
    assert_eq!(err.verdict(), TrustVerdict::WORLD_WRITABLE);
}

#[test]
fn writable_file_without_suffix_is_ignored() {
    let tree = Tree::new();
    tree.file("notes.txt", 0o666);
    tree.file("cpu.irkmod", 0o644);

    let result = tree.walker(&[]).discover(&tree.root).unwrap();
    assert_eq!(result.len(), 1);
}

#[test]
fn untrusted_owner_is_reported() {
    let tree = Tree::new();
    tree.file("cpu.irkmod", 0o644);
    let config = config::Discovery {
        trusted_owner: tree.uid.wrapping_add(1),
        ..tree.config()
    };

    let err = tree
        .walker_with(config, &[])
        .discover(&tree.root)
        .unwrap_err();

    assert_eq!(err.path(), tree.root.as_path());
    assert_eq!(err.verdict(), TrustVerdict::UNTRUSTED_OWNER);
}

#[test]
fn link_into_untrusted_directory_is_rejected() {
    let tree = Tree::new();
    let outside = Tree::new();
    outside.file("sneaky.irkmod", 0o644);
    fs::set_permissions(&outside.root, Permissions::from_mode(0o777)).unwrap();
    tree.file("a.irkmod", 0o644);
    tree.link("linked", &outside.root);

    let err = tree.walker(&[&outside]).discover(&tree.root).unwrap_err();

    assert_eq!(err.path(), outside.root.as_path());
    assert!(err.verdict().contains(TrustVerdict::WORLD_WRITABLE));
}

#[test]
fn links_resolve_to_canonical_paths_once() {
    let tree = Tree::new();
    let outside = Tree::new();
    let target = outside.file("shared.irkmod", 0o644);
    tree.link("linked", &outside.root);
    tree.link("alias.irkmod", &target);

    let result = tree.walker(&[&outside]).discover(&tree.root).unwrap();

    assert_eq!(paths(&result), vec![target]);
}

#[test]
fn dangling_link_is_skipped() {
    let tree = Tree::new();
    tree.link("broken.irkmod", tree.root.join("nowhere"));
    tree.file("cpu.irkmod", 0o644);

    let result = tree.walker(&[]).discover(&tree.root).unwrap();
    assert_eq!(result.len(), 1);
}

#[test]
fn directory_cycle_is_not_followed() {
    let tree = Tree::new();
    let module = tree.file("cpu.irkmod", 0o644);
    tree.dir("sub", 0o755);
    let nested = tree.file("sub/disk.irkmod", 0o644);
    tree.link("sub/top", &tree.root);

    let result = tree.walker(&[]).discover(&tree.root).unwrap();

    assert_eq!(paths(&result), vec![module, nested]);
}

#[test]
fn unreadable_directory_is_a_traversal_error() {
    let tree = Tree::new();
    tree.file("cpu.irkmod", 0o644);
    let sealed = tree.dir("sealed", 0o755);
    tree.file("sealed/disk.irkmod", 0o644);
    fs::set_permissions(&sealed, Permissions::from_mode(0o000)).unwrap();
    // root ignores directory permissions
    if fs::read_dir(&sealed).is_ok() {
        return;
    }

    let err = tree.walker(&[]).discover(&tree.root).unwrap_err();
    fs::set_permissions(&sealed, Permissions::from_mode(0o755)).unwrap();

    assert!(matches!(err, DiscoveryError::Traversal { .. }));
    assert_eq!(err.path(), sealed.as_path());
    assert_eq!(err.verdict(), TrustVerdict::IO_ERROR);
}

#[test]
fn missing_root_is_a_traversal_error() {
    let tree = Tree::new();
    let missing = tree.root.join("missing");

    let err = tree.walker(&[]).discover(&missing).unwrap_err();

    assert!(matches!(err, DiscoveryError::Traversal { .. }));
    assert_eq!(err.path(), missing.as_path());
}

#[test]
fn fixed_permissions_are_picked_up_by_next_run() {
    let tree = Tree::new();
    tree.file("a.irkmod", 0o644);
    let evil = tree.dir("evil", 0o777);
    tree.file("evil/b.irkmod", 0o644);
    let walker = tree.walker(&[]);

    assert!(walker.discover(&tree.root).is_err());

    fs::set_permissions(&evil, Permissions::from_mode(0o755)).unwrap();
    let result = walker.discover(&tree.root).unwrap();
    assert_eq!(result.len(), 2);

    let diff = result.diff(&discovery::DiscoveryResult::default());
    assert_eq!(diff.added.len(), 2);
}

#[test]
fn real_filesystem_rejects_world_writable_module_dir() {
    let tree = Tree::new();
    let modules = tree.dir("modules", 0o777);
    tree.file("modules/cpu.irkmod", 0o644);

    let walker = ModuleDiscoveryWalker::new(&config::Discovery::default());
    let err = walker.discover(&modules).unwrap_err();

    assert!(!err.verdict().is_trusted());
}
