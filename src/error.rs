//! Error taxonomy for discovery, deletion and the tidy step.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure running an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to start `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Status {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("no command configured")]
    Empty,
}

/// Every fatal condition of a pruning run, plus the tidy warning.
#[derive(Debug, Error)]
pub enum PruneError {
    /// The package listing call failed or produced output that could not be decoded.
    #[error("failed to discover packages in {dir}: {message}")]
    Discovery {
        dir: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Traversing the source tree failed before anything was removed.
    #[error("failed to walk {path}")]
    Walk {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A single path could not be removed. Earlier removals stay in place.
    #[error("failed to remove {path}")]
    Removal {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A live run was asked to keep files, yet none of them exist under the
    /// root, usually because the listing spelled paths differently from the walk.
    #[error("none of the {listed} files to keep were found under {root}; refusing to delete")]
    KeepListUnmatched { root: PathBuf, listed: usize },

    /// The post-cleanup tidy command failed. Never fatal.
    #[error("tidy step failed in {dir}")]
    Tidy {
        dir: PathBuf,
        #[source]
        source: CommandError,
    },

    #[error("invalid toolchain profile {origin}")]
    Toolchain {
        origin: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("no package patterns given")]
    NoPatterns,
}

impl PruneError {
    pub(crate) fn discovery_caused_by(
        dir: impl Into<PathBuf>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        PruneError::Discovery {
            dir: dir.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether the run must stop. Only the tidy warning is recoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PruneError::Tidy { .. })
    }
}

pub type Result<T, E = PruneError> = std::result::Result<T, E>;
