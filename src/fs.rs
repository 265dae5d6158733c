//! Filesystem capability used by the deletion engine and embed scanner.
//!
//! `OsFs` touches real storage; `MemoryFs` keeps a tree in memory so the
//! destructive passes can be exercised without it.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use ignore::WalkBuilder;

/// A non-directory entry found while walking a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub len: u64,
}

/// An immediate child of a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

impl DirEntry {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Operations the pruning passes need from storage.
pub trait FileSystem {
    /// Every non-directory entry below `root`, recursively. Symlinks are not followed.
    fn walk_files(&self, root: &Path) -> io::Result<Vec<FileEntry>>;
    /// Immediate children of `dir`.
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>>;
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
    fn is_dir(&self, path: &Path) -> bool;
    /// The path with every symlink in it resolved.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

impl FileSystem for OsFs {
    fn walk_files(&self, root: &Path) -> io::Result<Vec<FileEntry>> {
        // Fail fast on a missing root; the walker would only yield an error entry
        fs::symlink_metadata(root)?;

        // Every file counts here, so all ignore-file processing is off
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .parents(false)
            .git_ignore(false)
            .ignore(false)
            .git_global(false)
            .git_exclude(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut files = Vec::new();
        for result in walker {
            let entry = result.map_err(|err| match err.into_io_error() {
                Some(io_err) => io_err,
                None => io::Error::other("directory walk failed"),
            })?;

            if entry.depth() == 0 || entry.file_type().is_some_and(|ft| ft.is_dir()) {
                continue;
            }

            // Use symlink_metadata to avoid following symlinks
            let metadata = fs::symlink_metadata(entry.path())?;
            files.push(FileEntry {
                path: entry.path().to_path_buf(),
                len: metadata.len(),
            });
        }

        Ok(files)
    }

    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            entries.push(DirEntry {
                path: entry.path(),
                is_dir: entry.file_type()?.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok_and(|m| m.is_dir())
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        fs::canonicalize(path)
    }
}

#[derive(Debug, Clone)]
enum Node {
    File(Vec<u8>),
    Dir,
}

/// In-memory filesystem.
///
/// Adding a file creates its missing ancestors. Paths registered with
/// [`MemoryFs::fail_removal_of`] refuse to be removed, to simulate
/// permission errors.
#[derive(Default)]
pub struct MemoryFs {
    nodes: Mutex<BTreeMap<PathBuf, Node>>,
    undeletable: Mutex<HashSet<PathBuf>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a file and return `self` (for chaining).
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl AsRef<[u8]>) -> Self {
        self.add_file(path, content);
        self
    }

    /// Builder: add an (empty) directory.
    pub fn with_dir(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut nodes = self.lock_nodes();
        insert_ancestors(&mut nodes, &path);
        nodes.insert(path, Node::Dir);
        drop(nodes);
        self
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, content: impl AsRef<[u8]>) {
        let path = path.into();
        let mut nodes = self.lock_nodes();
        insert_ancestors(&mut nodes, &path);
        nodes.insert(path, Node::File(content.as_ref().to_vec()));
    }

    /// Make every later removal of `path` fail with `PermissionDenied`.
    pub fn fail_removal_of(self, path: impl Into<PathBuf>) -> Self {
        self.undeletable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.into());
        self
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.lock_nodes().contains_key(path)
    }

    /// All file paths, sorted.
    pub fn files(&self) -> Vec<PathBuf> {
        self.lock_nodes()
            .iter()
            .filter(|(_, node)| matches!(node, Node::File(_)))
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// All directory paths, sorted.
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.lock_nodes()
            .iter()
            .filter(|(_, node)| matches!(node, Node::Dir))
            .map(|(path, _)| path.clone())
            .collect()
    }

    fn lock_nodes(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Node>> {
        self.nodes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_removable(&self, path: &Path) -> io::Result<()> {
        let undeletable = self
            .undeletable
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if undeletable.contains(path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "permission denied",
            ));
        }
        Ok(())
    }
}

fn insert_ancestors(nodes: &mut BTreeMap<PathBuf, Node>, path: &Path) {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file or directory", path.display()),
    )
}

impl FileSystem for MemoryFs {
    fn walk_files(&self, root: &Path) -> io::Result<Vec<FileEntry>> {
        let nodes = self.lock_nodes();
        match nodes.get(root) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => {
                return Err(io::Error::other(format!(
                    "{}: not a directory",
                    root.display()
                )))
            }
            None => return Err(not_found(root)),
        }

        Ok(nodes
            .iter()
            .filter(|(path, _)| path.as_path() != root && path.starts_with(root))
            .filter_map(|(path, node)| match node {
                Node::File(content) => Some(FileEntry {
                    path: path.clone(),
                    len: content.len() as u64,
                }),
                Node::Dir => None,
            })
            .collect())
    }

    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let nodes = self.lock_nodes();
        if !matches!(nodes.get(dir), Some(Node::Dir)) {
            return Err(not_found(dir));
        }

        Ok(nodes
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .map(|(path, node)| DirEntry {
                path: path.clone(),
                is_dir: matches!(node, Node::Dir),
            })
            .collect())
    }

    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match self.lock_nodes().get(path) {
            Some(Node::File(content)) => String::from_utf8(content.clone())
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err)),
            Some(Node::Dir) => Err(io::Error::other(format!(
                "{}: is a directory",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.check_removable(path)?;
        let mut nodes = self.lock_nodes();
        match nodes.get(path) {
            Some(Node::File(_)) => {
                nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(io::Error::other(format!(
                "{}: is a directory",
                path.display()
            ))),
            None => Err(not_found(path)),
        }
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        self.check_removable(path)?;
        let mut nodes = self.lock_nodes();
        if !matches!(nodes.get(path), Some(Node::Dir)) {
            return Err(not_found(path));
        }
        if nodes.keys().any(|p| p.parent() == Some(path)) {
            return Err(io::Error::other(format!(
                "{}: directory not empty",
                path.display()
            )));
        }
        nodes.remove(path);
        Ok(())
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock_nodes().get(path), Some(Node::Dir))
    }

    // No symlinks in memory
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        if self.exists(path) {
            Ok(path.to_path_buf())
        } else {
            Err(not_found(path))
        }
    }
}
