//! Hatchet - Monorepo Package Pruner
//!
//! Hatchet cuts a Go monorepo down to exactly the files needed to build a chosen set of
//! packages (optionally with their tests) and deletes everything else.
//!
//! ## Architecture
//!
//! - Package graph (`resolver`): one toolchain listing call yields a record per package;
//!   caller patterns select packages, and the selection is closed over in-tree dependencies
//!   before being projected into a flat list of files to keep.
//! - Deletion engine (`cleaner`): every file under the root is classified keep/remove
//!   (keep list, VCS metadata, module manifests), the remove set is deleted, then empty
//!   directories are collapsed bottom-up. Dry-run takes the same path without removing.
//! - External processes and storage sit behind the `Commander` and `FileSystem` traits so
//!   both passes run against in-memory substitutes in tests.

pub mod cleaner;
pub mod command;
pub mod embed;
pub mod error;
pub mod fs;
pub mod package;
pub mod patterns;
pub mod prune;
pub mod resolver;
pub mod toolchain;

// Re-export commonly used items
pub use cleaner::{
    CleanReport, Cleaner, Classification, KeepReason, Phase, ProtectionPolicy, Verdict,
};
pub use command::{CommandSpec, Commander, ScriptedCommander, SystemCommander};
pub use embed::EmbedScanner;
pub use error::{CommandError, PruneError, Result};
pub use fs::{DirEntry, FileEntry, FileSystem, MemoryFs, OsFs};
pub use package::{PackageLoadError, PackageRecord};
pub use patterns::{parse_pattern_list, PackagePattern, PatternSyntax};
pub use prune::{PruneOptions, PruneReport, Pruner};
pub use resolver::{KeepSet, PackageGraph, Resolution};
pub use toolchain::Toolchain;
