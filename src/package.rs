//! Package records as reported by the toolchain's listing command.

use std::path::PathBuf;

use serde::Deserialize;

/// Load error reported by the toolchain for a single package.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageLoadError {
    #[serde(rename = "Err", default)]
    pub message: String,
}

/// One package in the source tree.
///
/// File lists are relative to `dir`. Field names follow the `go list -json`
/// output; any field the listing omits is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PackageRecord {
    #[serde(rename = "ImportPath")]
    pub identity: String,
    #[serde(rename = "Dir", default)]
    pub dir: PathBuf,
    /// In-tree and external identities alike.
    #[serde(rename = "Deps", default)]
    pub deps: Vec<String>,
    #[serde(rename = "GoFiles", default)]
    pub go_files: Vec<String>,
    #[serde(rename = "TestGoFiles", default)]
    pub test_go_files: Vec<String>,
    /// Tests in the `_test` package that live next to this one.
    #[serde(rename = "XTestGoFiles", default)]
    pub xtest_go_files: Vec<String>,
    #[serde(rename = "OtherFiles", default)]
    pub other_files: Vec<String>,
    #[serde(rename = "EmbedFiles", default)]
    pub embed_files: Vec<String>,
    #[serde(rename = "Error", default)]
    pub error: Option<PackageLoadError>,
}

impl PackageRecord {
    /// Convenience constructor used by tests and callers building graphs by hand.
    pub fn new(identity: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        PackageRecord {
            identity: identity.into(),
            dir: dir.into(),
            ..Default::default()
        }
    }

    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_go_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.go_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_test_go_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_go_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_xtest_go_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.xtest_go_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_other_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.other_files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_embed_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.embed_files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Absolute path of a file listed relative to the package directory.
    pub fn file_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}
