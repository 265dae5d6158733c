//! Package graph: discovery, selection, dependency closure and file projection.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::command::{CommandSpec, Commander};
use crate::embed::EmbedScanner;
use crate::error::{PruneError, Result};
use crate::package::PackageRecord;
use crate::patterns::PackagePattern;
use crate::toolchain::Toolchain;

/// Identities of the packages to keep. Grows only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeepSet(BTreeSet<String>);

impl KeepSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the identity was not already kept.
    pub fn insert(&mut self, identity: impl Into<String>) -> bool {
        self.0.insert(identity.into())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.0.contains(identity)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identities in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for KeepSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        KeepSet(iter.into_iter().map(Into::into).collect())
    }
}

/// Outcome of a full resolution pass.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub keep: KeepSet,
    /// Absolute paths to preserve. Order carries no meaning.
    pub files: Vec<PathBuf>,
    /// Entries added to embed lists by scanning directives.
    pub embeds_found: usize,
}

/// Every package in the tree, keyed by identity.
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    packages: HashMap<String, PackageRecord>,
}

impl PackageGraph {
    /// Run the toolchain's listing command in `source_dir` and decode its output.
    pub fn discover(
        commander: &dyn Commander,
        toolchain: &Toolchain,
        source_dir: &Path,
    ) -> Result<Self> {
        let spec = CommandSpec::from_argv(&toolchain.list_command, source_dir).map_err(|err| {
            PruneError::discovery_caused_by(source_dir, "invalid list command", err)
        })?;

        info!(command = %spec, dir = %source_dir.display(), "listing packages");

        let stdout = commander.output(&spec).map_err(|err| {
            PruneError::discovery_caused_by(source_dir, "failed to list packages", err)
        })?;

        Self::decode(source_dir, &stdout)
    }

    /// Decode a stream of concatenated JSON package records.
    ///
    /// Any record that fails to decode fails the whole stream.
    pub fn decode(source_dir: &Path, stream: &[u8]) -> Result<Self> {
        let mut graph = PackageGraph::default();

        let records = serde_json::Deserializer::from_slice(stream).into_iter::<PackageRecord>();
        for (index, record) in records.enumerate() {
            let record = record.map_err(|err| {
                PruneError::discovery_caused_by(
                    source_dir,
                    format!("failed to decode package record #{}", index + 1),
                    err,
                )
            })?;
            debug!(identity = %record.identity, dir = %record.dir.display(), "found package");
            graph.add(record);
        }

        info!(packages = graph.len(), "discovered packages");
        Ok(graph)
    }

    pub fn from_records(records: impl IntoIterator<Item = PackageRecord>) -> Self {
        let mut graph = PackageGraph::default();
        for record in records {
            graph.add(record);
        }
        graph
    }

    fn add(&mut self, record: PackageRecord) {
        if let Some(error) = &record.error {
            warn!(identity = %record.identity, error = %error.message, "package reported a load error");
        }
        if let Some(previous) = self.packages.insert(record.identity.clone(), record) {
            warn!(identity = %previous.identity, "duplicate package identity, keeping the later record");
        }
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn get(&self, identity: &str) -> Option<&PackageRecord> {
        self.packages.get(identity)
    }

    /// Whether the identity names a package in this tree.
    pub fn contains(&self, identity: &str) -> bool {
        self.packages.contains_key(identity)
    }

    /// Packages matched by any of `patterns`. Patterns matching nothing contribute nothing.
    pub fn select(&self, patterns: &[PackagePattern]) -> KeepSet {
        let mut keep = KeepSet::new();
        for pattern in patterns {
            debug!(pattern = pattern.as_str(), "processing pattern");
            let mut matched = 0usize;
            for record in self.packages.values() {
                if pattern.matches(&record.identity, &record.dir) {
                    debug!(identity = %record.identity, dir = %record.dir.display(), "matched package");
                    keep.insert(record.identity.clone());
                    matched += 1;
                }
            }
            if matched == 0 {
                warn!(pattern = pattern.as_str(), "pattern matched no packages");
            }
        }
        keep
    }

    /// Add every in-tree package reachable from `keep`. External identities
    /// are skipped. Returns how many packages were added.
    pub fn close(&self, keep: &mut KeepSet) -> usize {
        let mut queue: VecDeque<String> = keep.iter().map(str::to_string).collect();
        let mut added = 0;

        while let Some(identity) = queue.pop_front() {
            let Some(record) = self.packages.get(&identity) else {
                continue;
            };
            for dep in &record.deps {
                if self.packages.contains_key(dep) && keep.insert(dep.clone()) {
                    debug!(package = %identity, dependency = %dep, "keeping dependency");
                    queue.push_back(dep.clone());
                    added += 1;
                }
            }
        }

        added
    }

    /// Absolute paths of the files the kept packages need.
    ///
    /// Primary sources and embedded files are always listed. With tests,
    /// test sources, external tests and every other file are listed; without,
    /// other files inside the fixture directory are left out.
    pub fn project(&self, keep: &KeepSet, with_tests: bool, toolchain: &Toolchain) -> Vec<PathBuf> {
        let mut files = Vec::new();

        for identity in keep.iter() {
            let Some(record) = self.packages.get(identity) else {
                continue;
            };

            files.extend(record.go_files.iter().map(|f| record.file_path(f)));

            if with_tests {
                for file in record.test_go_files.iter().chain(&record.xtest_go_files) {
                    let path = record.file_path(file);
                    debug!(path = %path.display(), "keeping test file");
                    files.push(path);
                }

                for file in &record.other_files {
                    let path = record.file_path(file);
                    debug!(path = %path.display(), "keeping other file");
                    files.push(path);
                }
            } else {
                for file in &record.other_files {
                    let path = record.file_path(file);
                    // Relative to the package, so a tree under a `testdata` ancestor keeps its files
                    if toolchain.in_fixture_dir(Path::new(file)) {
                        debug!(path = %path.display(), "dropping fixture file");
                        continue;
                    }
                    debug!(path = %path.display(), "keeping other file");
                    files.push(path);
                }
            }

            for file in &record.embed_files {
                let path = record.file_path(file);
                debug!(path = %path.display(), "keeping embedded file");
                files.push(path);
            }
        }

        files
    }

    /// Merge the resources referenced by embed directives into each kept
    /// package's embed list. Returns the number of new entries.
    pub fn fold_embeds(&mut self, keep: &KeepSet, scanner: &EmbedScanner<'_>) -> usize {
        let mut added = 0;
        for identity in keep.iter() {
            let Some(record) = self.packages.get_mut(identity) else {
                continue;
            };
            for file in scanner.scan_package(record) {
                if !record.embed_files.contains(&file) {
                    debug!(identity = %record.identity, file = %file, "adding embedded file");
                    record.embed_files.push(file);
                    added += 1;
                }
            }
        }
        added
    }

    /// Select, close, fold embeds (when a scanner is given) and project.
    pub fn resolve(
        &mut self,
        patterns: &[PackagePattern],
        with_tests: bool,
        toolchain: &Toolchain,
        scanner: Option<&EmbedScanner<'_>>,
    ) -> Resolution {
        let mut keep = self.select(patterns);
        let selected = keep.len();
        let dependencies = self.close(&mut keep);
        info!(selected, dependencies, "resolved packages to keep");

        let embeds_found = match scanner {
            Some(scanner) => self.fold_embeds(&keep, scanner),
            None => 0,
        };

        let files = self.project(&keep, with_tests, toolchain);
        info!(files = files.len(), "files to keep");
        Resolution {
            keep,
            files,
            embeds_found,
        }
    }
}
