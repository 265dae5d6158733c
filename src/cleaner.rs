//! Deletion engine: classify every file, remove the rest, collapse empty directories.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{PruneError, Result};
use crate::fs::{FileEntry, FileSystem};
use crate::toolchain::Toolchain;

/// Which files survive regardless of the keep list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionPolicy {
    /// Keep everything inside version-control metadata directories.
    pub protect_vcs: bool,
    /// Keep module manifests that are not inside a fixture directory.
    pub protect_manifests: bool,
}

impl Default for ProtectionPolicy {
    fn default() -> Self {
        ProtectionPolicy {
            protect_vcs: true,
            protect_manifests: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepReason {
    /// On the keep list.
    Listed,
    VersionControl,
    Manifest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep(KeepReason),
    Remove,
}

/// Where a run currently is. Errors move straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pending,
    Classifying,
    Removing,
    CollapsingDirectories,
    Done,
    Failed,
}

/// Verdicts for every file under the root.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub keep: Vec<(FileEntry, KeepReason)>,
    pub remove: Vec<FileEntry>,
}

/// What a run removed, or in dry-run mode would remove.
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    pub dry_run: bool,
    pub kept: Vec<PathBuf>,
    /// Kept only because of the protection policy.
    pub protected: usize,
    pub removed_files: Vec<PathBuf>,
    /// Bottom-up: children before their parents.
    pub removed_dirs: Vec<PathBuf>,
    pub reclaimed_bytes: u64,
}

/// Prunes a tree down to an explicit set of files.
pub struct Cleaner<'a> {
    fs: &'a dyn FileSystem,
    toolchain: &'a Toolchain,
    root: PathBuf,
    keep: HashSet<PathBuf>,
    policy: ProtectionPolicy,
    dry_run: bool,
    phase: Phase,
}

impl<'a> Cleaner<'a> {
    pub fn new(
        fs: &'a dyn FileSystem,
        toolchain: &'a Toolchain,
        root: impl Into<PathBuf>,
        keep: impl IntoIterator<Item = PathBuf>,
    ) -> Self {
        Cleaner {
            fs,
            toolchain,
            root: root.into(),
            keep: keep.into_iter().collect(),
            policy: ProtectionPolicy::default(),
            dry_run: false,
            phase: Phase::Pending,
        }
    }

    pub fn with_policy(mut self, policy: ProtectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report instead of removing.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Verdict for a single absolute path. Never touches storage.
    ///
    /// Directory rules only look below the root, so a tree that itself sits
    /// inside a `testdata` directory keeps its manifests.
    pub fn classify_path(&self, path: &Path) -> Verdict {
        if self.keep.contains(path) {
            return Verdict::Keep(KeepReason::Listed);
        }

        let relative = path.strip_prefix(&self.root).unwrap_or(path);

        if self.policy.protect_vcs && self.toolchain.in_vcs_dir(relative) {
            return Verdict::Keep(KeepReason::VersionControl);
        }

        // Manifests inside fixtures are test data, not real modules
        if self.policy.protect_manifests
            && self.toolchain.is_manifest(relative)
            && !self.toolchain.in_fixture_dir(relative)
        {
            return Verdict::Keep(KeepReason::Manifest);
        }

        Verdict::Remove
    }

    /// Walk the whole tree and classify every file.
    pub fn classify(&self) -> Result<Classification> {
        let files = self
            .fs
            .walk_files(&self.root)
            .map_err(|source| PruneError::Walk {
                path: self.root.clone(),
                source,
            })?;

        let mut classification = Classification::default();
        for entry in files {
            match self.classify_path(&entry.path) {
                Verdict::Keep(reason) => {
                    debug!(path = %entry.path.display(), ?reason, "keeping");
                    classification.keep.push((entry, reason));
                }
                Verdict::Remove => classification.remove.push(entry),
            }
        }

        Ok(classification)
    }

    /// Run all passes. On error the phase is `Failed` and removals already
    /// made stay made.
    pub fn clean(&mut self) -> Result<CleanReport> {
        let result = self.run_passes();
        if result.is_err() {
            self.enter(Phase::Failed);
        }
        result
    }

    fn run_passes(&mut self) -> Result<CleanReport> {
        self.enter(Phase::Classifying);
        let classification = self.classify()?;

        let mut report = CleanReport {
            dry_run: self.dry_run,
            protected: classification
                .keep
                .iter()
                .filter(|(_, reason)| *reason != KeepReason::Listed)
                .count(),
            kept: classification
                .keep
                .into_iter()
                .map(|(entry, _)| entry.path)
                .collect(),
            ..Default::default()
        };
        info!(
            keep = report.kept.len(),
            remove = classification.remove.len(),
            "classified files"
        );

        let listed = report.kept.len() - report.protected;
        if !self.keep.is_empty() && listed == 0 {
            if !self.dry_run {
                return Err(PruneError::KeepListUnmatched {
                    root: self.root.clone(),
                    listed: self.keep.len(),
                });
            }
            warn!(
                root = %self.root.display(),
                listed = self.keep.len(),
                "no file to keep exists under the root; a live run would refuse to delete"
            );
        }

        self.enter(Phase::Removing);
        let mut gone = HashSet::new();
        for entry in classification.remove {
            if !self.dry_run {
                self.fs
                    .remove_file(&entry.path)
                    .map_err(|source| PruneError::Removal {
                        path: entry.path.clone(),
                        source,
                    })?;
                debug!(path = %entry.path.display(), "removed");
            }
            report.reclaimed_bytes += entry.len;
            gone.insert(entry.path.clone());
            report.removed_files.push(entry.path);
        }

        self.enter(Phase::CollapsingDirectories);
        let root = self.root.clone();
        self.collapse(&root, &mut gone, &mut report.removed_dirs)?;

        self.enter(Phase::Done);
        info!(
            files = report.removed_files.len(),
            dirs = report.removed_dirs.len(),
            dry_run = self.dry_run,
            "prune finished"
        );
        Ok(report)
    }

    /// Depth-first: children are collapsed before their parent is checked.
    /// `gone` holds paths already removed (or that would be, in dry-run), so
    /// both modes see the same emptiness.
    fn collapse(
        &self,
        dir: &Path,
        gone: &mut HashSet<PathBuf>,
        removed_dirs: &mut Vec<PathBuf>,
    ) -> Result<()> {
        let walk_error = |source: io::Error| PruneError::Walk {
            path: dir.to_path_buf(),
            source,
        };

        for entry in self.fs.read_dir(dir).map_err(walk_error)? {
            if !entry.is_dir {
                continue;
            }
            // Skip VCS metadata entirely
            if self.policy.protect_vcs
                && entry
                    .file_name()
                    .is_some_and(|name| self.toolchain.is_vcs_dir_name(name))
            {
                continue;
            }
            self.collapse(&entry.path, gone, removed_dirs)?;
        }

        if dir == self.root {
            return Ok(());
        }

        let remaining = self.fs.read_dir(dir).map_err(walk_error)?;
        if remaining.iter().all(|entry| gone.contains(&entry.path)) {
            if !self.dry_run {
                self.fs
                    .remove_dir(dir)
                    .map_err(|source| PruneError::Removal {
                        path: dir.to_path_buf(),
                        source,
                    })?;
            }
            debug!(path = %dir.display(), dry_run = self.dry_run, "collapsed empty directory");
            gone.insert(dir.to_path_buf());
            removed_dirs.push(dir.to_path_buf());
        }

        Ok(())
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "cleaner phase");
        self.phase = phase;
    }
}
