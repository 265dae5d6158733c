//! Host toolchain profile: commands and naming conventions.

use std::fs;
use std::path::{Component, Path};

use serde::Deserialize;

use crate::error::{PruneError, Result};
use crate::patterns::PatternSyntax;

// Embed the default profile directly in the binary at compile time
const TOOLCHAIN_TOML: &str = include_str!("../toolchain.toml");

/// Commands and file-naming conventions of the toolchain that owns the tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Toolchain {
    pub name: String,
    /// Prints one JSON package record per package, concatenated.
    pub list_command: Vec<String>,
    /// Run after a live prune; failure only warns.
    pub tidy_command: Vec<String>,
    /// Module manifests protected from deletion outside fixture directories.
    pub manifest_files: Vec<String>,
    /// Version-control metadata directories.
    pub vcs_dirs: Vec<String>,
    /// Directory name holding test-only data.
    pub fixture_dir: String,
    /// Pattern suffix selecting a whole subtree, e.g. `/...`.
    pub recursive_suffix: String,
    /// Prefix that, combined with the recursive suffix, selects everything.
    pub current_dir_token: String,
    /// Comment prefix introducing a resource-inclusion directive.
    pub embed_directive: String,
}

/// A user profile; keys it leaves out keep their built-in value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolchainOverrides {
    name: Option<String>,
    list_command: Option<Vec<String>>,
    tidy_command: Option<Vec<String>>,
    manifest_files: Option<Vec<String>>,
    vcs_dirs: Option<Vec<String>>,
    fixture_dir: Option<String>,
    recursive_suffix: Option<String>,
    current_dir_token: Option<String>,
    embed_directive: Option<String>,
}

impl Toolchain {
    /// The built-in Go profile.
    pub fn builtin() -> Result<Self> {
        toml::from_str(TOOLCHAIN_TOML).map_err(|source| PruneError::Toolchain {
            origin: "(built-in)".to_string(),
            source: Box::new(source),
        })
    }

    /// Load a profile file and layer it over the built-in one.
    pub fn load(path: &Path) -> Result<Self> {
        let origin = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| PruneError::Toolchain {
            origin: origin.clone(),
            source: Box::new(source),
        })?;
        Self::builtin()?.with_overrides(&content, &origin)
    }

    fn with_overrides(mut self, content: &str, origin: &str) -> Result<Self> {
        let overrides: ToolchainOverrides =
            toml::from_str(content).map_err(|source| PruneError::Toolchain {
                origin: origin.to_string(),
                source: Box::new(source),
            })?;

        if let Some(name) = overrides.name {
            self.name = name;
        }
        if let Some(list_command) = overrides.list_command {
            self.list_command = list_command;
        }
        if let Some(tidy_command) = overrides.tidy_command {
            self.tidy_command = tidy_command;
        }
        if let Some(manifest_files) = overrides.manifest_files {
            self.manifest_files = manifest_files;
        }
        if let Some(vcs_dirs) = overrides.vcs_dirs {
            self.vcs_dirs = vcs_dirs;
        }
        if let Some(fixture_dir) = overrides.fixture_dir {
            self.fixture_dir = fixture_dir;
        }
        if let Some(recursive_suffix) = overrides.recursive_suffix {
            self.recursive_suffix = recursive_suffix;
        }
        if let Some(current_dir_token) = overrides.current_dir_token {
            self.current_dir_token = current_dir_token;
        }
        if let Some(embed_directive) = overrides.embed_directive {
            self.embed_directive = embed_directive;
        }

        Ok(self)
    }

    pub fn pattern_syntax(&self) -> PatternSyntax {
        PatternSyntax {
            recursive_suffix: self.recursive_suffix.clone(),
            current_dir_token: self.current_dir_token.clone(),
        }
    }

    /// Whether any directory above `path` is the fixture directory. Pass
    /// paths relative to the tree or package being checked.
    pub fn in_fixture_dir(&self, path: &Path) -> bool {
        has_dir_component(path, |name| name == self.fixture_dir)
    }

    /// Whether any directory above `path` is version-control metadata.
    pub fn in_vcs_dir(&self, path: &Path) -> bool {
        has_dir_component(path, |name| self.is_vcs_dir_name(name))
    }

    pub fn is_vcs_dir_name(&self, name: &str) -> bool {
        self.vcs_dirs.iter().any(|dir| dir == name)
    }

    /// Whether the base name of `path` is one of the manifest files.
    pub fn is_manifest(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| self.manifest_files.iter().any(|m| m == name))
    }
}

/// Check the directory components of `path` (the final component is the
/// entry itself and is not considered).
fn has_dir_component(path: &Path, mut matches: impl FnMut(&str) -> bool) -> bool {
    let Some(parent) = path.parent() else {
        return false;
    };
    parent.components().any(|c| match c {
        Component::Normal(os_str) => os_str.to_str().is_some_and(&mut matches),
        _ => false,
    })
}
