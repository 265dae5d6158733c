//! Orchestration: discover, resolve, delete, tidy.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::cleaner::{CleanReport, Cleaner, ProtectionPolicy};
use crate::command::{CommandSpec, Commander};
use crate::embed::EmbedScanner;
use crate::error::{CommandError, PruneError, Result};
use crate::fs::FileSystem;
use crate::patterns::PackagePattern;
use crate::resolver::{KeepSet, PackageGraph};
use crate::toolchain::Toolchain;

/// Runtime flags for one pruning run.
#[derive(Debug, Clone)]
pub struct PruneOptions {
    /// Absolute path of the tree to prune.
    pub source_dir: PathBuf,
    pub patterns: Vec<PackagePattern>,
    pub with_tests: bool,
    pub policy: ProtectionPolicy,
    pub dry_run: bool,
    /// Run the toolchain's tidy command after a live prune.
    pub tidy: bool,
}

/// Outcome of a successful run.
#[derive(Debug)]
pub struct PruneReport {
    pub discovered: usize,
    pub keep: KeepSet,
    /// Files added to embed lists by scanning directives.
    pub embeds_found: usize,
    pub kept_files: usize,
    pub clean: CleanReport,
    /// Set when the tidy step failed; the prune itself still succeeded.
    pub tidy_warning: Option<PruneError>,
}

/// Resolve symlinks in the directory of every kept file, so keep paths
/// compare equal to what the walk yields even when the listing reported a
/// symlinked spelling of the tree. Unresolvable directories are left as is.
fn canonical_keep_paths(fs: &dyn FileSystem, files: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut dirs: HashMap<PathBuf, PathBuf> = HashMap::new();
    files
        .into_iter()
        .map(|path| match (path.parent(), path.file_name()) {
            (Some(parent), Some(name)) => {
                let dir = dirs.entry(parent.to_path_buf()).or_insert_with(|| {
                    fs.canonicalize(parent)
                        .unwrap_or_else(|_| parent.to_path_buf())
                });
                dir.join(name)
            }
            _ => path.clone(),
        })
        .collect()
}

/// Wires the command runner and filesystem through every pass.
pub struct Pruner<'a> {
    commander: &'a dyn Commander,
    fs: &'a dyn FileSystem,
    toolchain: &'a Toolchain,
}

impl<'a> Pruner<'a> {
    pub fn new(
        commander: &'a dyn Commander,
        fs: &'a dyn FileSystem,
        toolchain: &'a Toolchain,
    ) -> Self {
        Pruner {
            commander,
            fs,
            toolchain,
        }
    }

    /// List every package under `source_dir`.
    pub fn discover(&self, source_dir: &Path) -> Result<PackageGraph> {
        PackageGraph::discover(self.commander, self.toolchain, source_dir)
    }

    /// Discover then prune.
    pub fn run(&self, options: &PruneOptions) -> Result<PruneReport> {
        if options.patterns.is_empty() {
            return Err(PruneError::NoPatterns);
        }
        let graph = self.discover(&options.source_dir)?;
        self.prune(graph, options)
    }

    /// Resolve the packages to keep in an already discovered graph, delete
    /// everything else and tidy the module.
    pub fn prune(&self, mut graph: PackageGraph, options: &PruneOptions) -> Result<PruneReport> {
        if options.patterns.is_empty() {
            return Err(PruneError::NoPatterns);
        }

        let scanner = EmbedScanner::new(self.fs, self.toolchain.embed_directive.clone());
        let resolution = graph.resolve(
            &options.patterns,
            options.with_tests,
            self.toolchain,
            Some(&scanner),
        );
        let kept_files = resolution.files.len();

        let root = self
            .fs
            .canonicalize(&options.source_dir)
            .unwrap_or_else(|_| options.source_dir.clone());
        let keep = canonical_keep_paths(self.fs, resolution.files);

        let clean = Cleaner::new(self.fs, self.toolchain, root, keep)
            .with_policy(options.policy)
            .with_dry_run(options.dry_run)
            .clean()?;

        let tidy_warning = if options.tidy && !options.dry_run {
            self.tidy(&options.source_dir).err()
        } else {
            None
        };
        if let Some(warning) = &tidy_warning {
            warn!(error = %warning, "tidy step failed");
        }

        Ok(PruneReport {
            discovered: graph.len(),
            keep: resolution.keep,
            embeds_found: resolution.embeds_found,
            kept_files,
            clean,
            tidy_warning,
        })
    }

    /// Run the toolchain's tidy command in `source_dir`.
    pub fn tidy(&self, source_dir: &Path) -> Result<()> {
        let tidy_error = |source: CommandError| PruneError::Tidy {
            dir: source_dir.to_path_buf(),
            source,
        };
        let spec = CommandSpec::from_argv(&self.toolchain.tidy_command, source_dir)
            .map_err(tidy_error)?;
        self.commander.output(&spec).map_err(tidy_error)?;
        info!(command = %spec, dir = %source_dir.display(), "tidied module");
        Ok(())
    }
}
