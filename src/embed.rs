//! Resolves resource-inclusion directives (`//go:embed`) to concrete files.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::fs::FileSystem;
use crate::package::PackageRecord;
use crate::patterns::{matches_component, to_slash};

/// Scans a package's primary sources for embed directives.
pub struct EmbedScanner<'a> {
    fs: &'a dyn FileSystem,
    directive: String,
}

impl<'a> EmbedScanner<'a> {
    pub fn new(fs: &'a dyn FileSystem, directive: impl Into<String>) -> Self {
        EmbedScanner {
            fs,
            directive: directive.into(),
        }
    }

    /// Files referenced by the package's directives, relative to its
    /// directory, sorted and deduplicated. Unreadable sources are skipped.
    pub fn scan_package(&self, record: &PackageRecord) -> Vec<String> {
        let mut found = BTreeSet::new();

        for file in &record.go_files {
            let path = record.file_path(file);
            let source = match self.fs.read_to_string(&path) {
                Ok(source) => source,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "could not read source file for embed scan");
                    continue;
                }
            };

            for pattern in self.directive_patterns(&source) {
                for matched in self.resolve(&record.dir, &pattern) {
                    if let Ok(relative) = matched.strip_prefix(&record.dir) {
                        found.insert(to_slash(&relative.to_string_lossy()).into_owned());
                    }
                }
            }
        }

        found.into_iter().collect()
    }

    /// Every pattern argument of every directive in `source`.
    pub fn directive_patterns(&self, source: &str) -> Vec<String> {
        let mut patterns = Vec::new();
        for line in source.lines() {
            let Some(rest) = line.trim().strip_prefix(self.directive.as_str()) else {
                continue;
            };
            // `//go:embedded` is not a directive
            if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
                continue;
            }
            patterns.extend(split_arguments(rest));
        }
        patterns
    }

    /// Resolve one pattern relative to `dir`.
    fn resolve(&self, dir: &Path, pattern: &str) -> Vec<PathBuf> {
        let (pattern, include_hidden) = match pattern.strip_prefix("all:") {
            Some(rest) => (rest, true),
            None => (pattern, false),
        };

        let components: Vec<&str> = pattern.split('/').collect();
        if components
            .iter()
            .any(|c| c.is_empty() || *c == "." || *c == "..")
        {
            debug!(pattern, "skipping invalid embed pattern");
            return Vec::new();
        }

        let mut candidates = vec![dir.to_path_buf()];
        for (i, component) in components.iter().enumerate() {
            let last = i + 1 == components.len();
            let mut next = Vec::new();
            for candidate in &candidates {
                let Ok(entries) = self.fs.read_dir(candidate) else {
                    continue;
                };
                for entry in entries {
                    let Some(name) = entry.file_name() else {
                        continue;
                    };
                    if (last || entry.is_dir) && matches_component(name, component) {
                        next.push(entry.path);
                    }
                }
            }
            candidates = next;
        }

        let mut files = Vec::new();
        for candidate in candidates {
            if !self.fs.is_dir(&candidate) {
                files.push(candidate);
                continue;
            }
            // A directory brings in its whole subtree
            let Ok(entries) = self.fs.walk_files(&candidate) else {
                continue;
            };
            files.extend(
                entries
                    .into_iter()
                    .map(|entry| entry.path)
                    .filter(|path| include_hidden || !is_hidden_below(&candidate, path)),
            );
        }

        debug!(pattern, matches = files.len(), "resolved embed pattern");
        files
    }
}

/// Whether any component of `path` below `root` starts with `.` or `_`.
fn is_hidden_below(root: &Path, path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    relative.components().any(|c| match c {
        Component::Normal(name) => name
            .to_str()
            .is_some_and(|n| n.starts_with('.') || n.starts_with('_')),
        _ => false,
    })
}

/// Split directive arguments on whitespace, honoring `"..."` and `` `...` `` quoting.
fn split_arguments(text: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        // Trailing line comment
        if c == '/' {
            let rest: String = chars.clone().collect();
            if rest.starts_with("//") {
                break;
            }
        }

        let mut arg = String::new();
        if c == '"' || c == '`' {
            chars.next();
            for ch in chars.by_ref() {
                if ch == c {
                    break;
                }
                arg.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                arg.push(ch);
                chars.next();
            }
        }

        if !arg.is_empty() {
            args.push(arg);
        }
    }

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemoryFs;

    const DIRECTIVE: &str = "//go:embed";

    fn package_with(fs: &MemoryFs, source: &str) -> PackageRecord {
        fs.add_file("/src/pkg/main.go", source);
        PackageRecord::new("repo/pkg", "/src/pkg").with_go_files(["main.go"])
    }

    #[test]
    fn test_directive_arguments_are_split_and_unquoted() {
        let fs = MemoryFs::new();
        let scanner = EmbedScanner::new(&fs, DIRECTIVE);
        let patterns = scanner.directive_patterns(
            "package a\n//go:embed a.txt \"b c.txt\" `d.txt` // trailing\n//go:embedded x\nvar x string\n",
        );
        assert_eq!(patterns, vec!["a.txt", "b c.txt", "d.txt"]);
    }

    #[test]
    fn test_literal_and_glob_patterns_resolve_to_files() {
        let fs = MemoryFs::new()
            .with_file("/src/pkg/testfile.txt", "hello")
            .with_file("/src/pkg/other.txt", "")
            .with_file("/src/pkg/skip.md", "");
        let record = package_with(
            &fs,
            "package a\n\n//go:embed testfile.txt\nvar content string\n\n//go:embed *.txt\nvar files embed.FS\n",
        );

        let scanner = EmbedScanner::new(&fs, DIRECTIVE);
        assert_eq!(scanner.scan_package(&record), vec!["other.txt", "testfile.txt"]);
    }

    #[test]
    fn test_directory_patterns_skip_hidden_files_unless_all() {
        let fs = MemoryFs::new()
            .with_file("/src/pkg/static/index.html", "")
            .with_file("/src/pkg/static/.keep", "")
            .with_file("/src/pkg/static/_draft/page.html", "")
            .with_file("/src/pkg/assets/.env", "");
        let record = package_with(&fs, "//go:embed static all:assets\nvar fs embed.FS\n");

        let scanner = EmbedScanner::new(&fs, DIRECTIVE);
        assert_eq!(
            scanner.scan_package(&record),
            vec!["assets/.env", "static/index.html"]
        );
    }

    #[test]
    fn test_unmatched_and_invalid_patterns_contribute_nothing() {
        let fs = MemoryFs::new().with_file("/src/secret.txt", "");
        let record = package_with(&fs, "//go:embed missing.txt ../secret.txt\nvar s string\n");

        let scanner = EmbedScanner::new(&fs, DIRECTIVE);
        assert!(scanner.scan_package(&record).is_empty());
    }

    #[test]
    fn test_class_patterns_resolve_to_files() {
        let fs = MemoryFs::new()
            .with_file("/src/pkg/schema/v1.sql", "")
            .with_file("/src/pkg/schema/v2.sql", "")
            .with_file("/src/pkg/schema/v3.sql", "");
        let record = package_with(&fs, "//go:embed schema/v[12].sql\nvar schema embed.FS\n");

        let scanner = EmbedScanner::new(&fs, DIRECTIVE);
        assert_eq!(
            scanner.scan_package(&record),
            vec!["schema/v1.sql", "schema/v2.sql"]
        );
    }
}
