//! Package pattern parsing and matching.

use std::borrow::Cow;
use std::path::Path;

use tracing::debug;

/// Pattern spelling conventions of the toolchain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSyntax {
    /// Suffix selecting a whole subtree, e.g. `/...`.
    pub recursive_suffix: String,
    /// Prefix meaning "here"; `./...` selects every package.
    pub current_dir_token: String,
}

impl Default for PatternSyntax {
    fn default() -> Self {
        PatternSyntax {
            recursive_suffix: "/...".to_string(),
            current_dir_token: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternKind {
    /// `./...`
    Everything,
    /// `prefix/...`
    Subtree(String),
    /// Anything without the recursive suffix.
    Package,
}

/// A caller-supplied package pattern, parsed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagePattern {
    raw: String,
    kind: PatternKind,
}

impl PackagePattern {
    pub fn parse(raw: &str, syntax: &PatternSyntax) -> Self {
        let raw = to_slash(raw).into_owned();
        let kind = match raw.strip_suffix(syntax.recursive_suffix.as_str()) {
            Some(prefix) if prefix == syntax.current_dir_token => PatternKind::Everything,
            Some(prefix) => PatternKind::Subtree(prefix.to_string()),
            None => PatternKind::Package,
        };
        PackagePattern { raw, kind }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Decide whether the package at `identity`/`dir` is selected.
    ///
    /// Checks run in order until one succeeds: exact identity, then either
    /// the subtree rules (identity suffix, identity prefix, directory
    /// substring) or the single-package rules (last identity segment,
    /// identity suffix, directory suffix). Case-sensitive.
    pub fn matches(&self, identity: &str, dir: &Path) -> bool {
        let identity = to_slash(identity);
        let dir_lossy = dir.to_string_lossy();
        let dir = to_slash(&dir_lossy);

        debug!(pattern = %self.raw, %identity, %dir, "matching pattern");

        if self.raw == identity {
            debug!("-> matched exact identity");
            return true;
        }

        match &self.kind {
            PatternKind::Everything => {
                debug!("-> matched current-directory wildcard");
                true
            }
            PatternKind::Subtree(prefix) => {
                if identity.ends_with(&format!("/{prefix}"))
                    || identity.starts_with(&format!("{prefix}/"))
                {
                    debug!("-> matched identity");
                    return true;
                }

                // Identities that don't mirror the directory layout
                if dir.contains(&format!("/{prefix}/")) {
                    debug!("-> matched directory path");
                    return true;
                }

                debug!("-> no wildcard matches found");
                false
            }
            PatternKind::Package => {
                let suffix = format!("/{}", self.raw);

                if identity.rsplit('/').next() == Some(self.raw.as_str()) {
                    debug!("-> matched package name");
                    return true;
                }

                if identity.ends_with(&suffix) {
                    debug!("-> matched identity suffix");
                    return true;
                }

                if dir.ends_with(&suffix) {
                    debug!("-> matched directory path");
                    return true;
                }

                debug!("-> no exact matches found");
                false
            }
        }
    }
}

/// Split a comma-separated pattern list. Entries are trimmed of whitespace
/// and trailing slashes; empty entries are dropped.
pub fn parse_pattern_list(list: &str, syntax: &PatternSyntax) -> Vec<PackagePattern> {
    list.split(',')
        .map(|entry| entry.trim().trim_end_matches('/'))
        .filter(|entry| !entry.is_empty())
        .map(|entry| PackagePattern::parse(entry, syntax))
        .collect()
}

/// Canonicalize separators to `/`.
pub fn to_slash(path: &str) -> Cow<'_, str> {
    if std::path::MAIN_SEPARATOR == '/' {
        Cow::Borrowed(path)
    } else {
        Cow::Owned(path.replace(std::path::MAIN_SEPARATOR, "/"))
    }
}

/// Match a single path component against a glob pattern: `*`, `?`,
/// `[...]` classes (ranges, `^` negation) and `\` escapes.
///
/// A malformed class matches nothing.
pub fn matches_component(component: &str, pattern: &str) -> bool {
    if !pattern.contains(|c| matches!(c, '*' | '?' | '[' | '\\')) {
        // No wildcards
        return pattern == component;
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = component.chars().collect();

    // Greedy scan, backtracking to the most recent star on mismatch
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some(width) = match_token(&pattern[p..], text[t]) {
            p += width;
            t += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Width of the token at the start of `pattern` when it matches `ch`.
fn match_token(pattern: &[char], ch: char) -> Option<usize> {
    match *pattern.first()? {
        '?' => Some(1),
        '\\' => (pattern.get(1) == Some(&ch)).then_some(2),
        '[' => match_class(pattern, ch),
        c => (c == ch).then_some(1),
    }
}

/// `pattern` starts at `[`.
fn match_class(pattern: &[char], ch: char) -> Option<usize> {
    let mut i = 1;
    let negated = pattern.get(i) == Some(&'^');
    if negated {
        i += 1;
    }

    let mut matched = false;
    let mut ranges = 0;
    loop {
        if *pattern.get(i)? == ']' && ranges > 0 {
            break;
        }
        let (lo, width) = class_char(&pattern[i..])?;
        i += width;
        let mut hi = lo;
        if pattern.get(i) == Some(&'-') {
            let (end, width) = class_char(&pattern[i + 1..])?;
            hi = end;
            i += 1 + width;
        }
        if lo <= ch && ch <= hi {
            matched = true;
        }
        ranges += 1;
    }

    (matched != negated).then_some(i + 1)
}

fn class_char(pattern: &[char]) -> Option<(char, usize)> {
    match *pattern.first()? {
        '-' | ']' => None,
        '\\' => pattern.get(1).map(|&c| (c, 2)),
        c => Some((c, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(raw: &str) -> PackagePattern {
        PackagePattern::parse(raw, &PatternSyntax::default())
    }

    #[test]
    fn test_exact_identity_matches() {
        assert!(pattern("example.com/repo/pkg1").matches(
            "example.com/repo/pkg1",
            Path::new("/go/src/example.com/repo/pkg1")
        ));
    }

    #[test]
    fn test_subtree_matches_children_but_not_siblings_sharing_a_prefix() {
        let p = pattern("a/...");
        assert!(p.matches("a/b", Path::new("/src/a/b")));
        assert!(!p.matches("ab", Path::new("/src/ab")));
    }

    #[test]
    fn test_subtree_matches_identity_ending_with_prefix() {
        assert!(pattern("repo/pkg/...").matches("example.com/x/repo/pkg", Path::new("/elsewhere")));
    }

    #[test]
    fn test_subtree_falls_back_to_directory() {
        let p = pattern("services/...");
        assert!(p.matches("example.com/renamed/api", Path::new("/src/services/api")));
        assert!(!p.matches("example.com/renamed/api", Path::new("/src/servicesapi")));
    }

    #[test]
    fn test_current_dir_wildcard_matches_everything() {
        let p = pattern("./...");
        assert!(p.matches("anything/at/all", Path::new("/x")));
        assert!(p.matches("root", Path::new("/")));
    }

    #[test]
    fn test_bare_name_matches_last_segment() {
        assert!(pattern("pkg1").matches("example.com/repo/pkg1", Path::new("/go/src/x")));
        assert!(!pattern("pkg").matches("example.com/repo/pkg1", Path::new("/go/src/x")));
    }

    #[test]
    fn test_multi_segment_name_matches_identity_suffix() {
        assert!(pattern("repo/pkg1").matches("example.com/repo/pkg1", Path::new("/x")));
        assert!(!pattern("epo/pkg1").matches("example.com/repo/pkg1", Path::new("/x")));
    }

    #[test]
    fn test_name_matches_directory_suffix_when_identity_differs() {
        assert!(pattern("tools/gen").matches("example.com/generator", Path::new("/src/tools/gen")));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert!(!pattern("Pkg1").matches("example.com/repo/pkg1", Path::new("/src/repo/pkg1")));
    }

    #[test]
    fn test_pattern_list_is_trimmed() {
        let patterns = parse_pattern_list(" repo/pkg1/ , ./...,, pkg2 ", &PatternSyntax::default());
        let raw: Vec<&str> = patterns.iter().map(PackagePattern::as_str).collect();
        assert_eq!(raw, vec!["repo/pkg1", "./...", "pkg2"]);
    }

    #[test]
    fn test_component_wildcards() {
        assert!(matches_component("index.html", "*.html"));
        assert!(matches_component("index.html", "index.*"));
        assert!(matches_component("index.html", "i*x.h?ml"));
        assert!(matches_component("a.txt", "*"));
        assert!(!matches_component("index.htm", "*.html"));
        assert!(!matches_component("ab", "a?c"));
        assert!(matches_component("abcbc", "a*bc"));
    }

    #[test]
    fn test_component_classes_and_escapes() {
        assert!(matches_component("a.txt", "[abc].txt"));
        assert!(!matches_component("d.txt", "[abc].txt"));
        assert!(matches_component("v7.sql", "v[0-9].sql"));
        assert!(matches_component("x.go", "[^a-c].go"));
        assert!(!matches_component("b.go", "[^a-c].go"));
        assert!(matches_component("*.txt", "\\*.txt"));
        assert!(!matches_component("a.txt", "\\*.txt"));
        assert!(matches_component("page-2.html", "page[\\-_]*.html"));
    }

    #[test]
    fn test_malformed_class_matches_nothing() {
        assert!(!matches_component("a", "[a"));
        assert!(!matches_component("a", "[]"));
        assert!(!matches_component("a", "[z-]"));
        assert!(!matches_component("[a]", "[a]"));
    }
}
