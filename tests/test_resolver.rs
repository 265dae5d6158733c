use hatchet::{
    parse_pattern_list, KeepSet, PackageGraph, PackagePattern, PackageRecord, PatternSyntax,
    Toolchain,
};
use std::path::{Path, PathBuf};

fn pattern(raw: &str) -> PackagePattern {
    PackagePattern::parse(raw, &PatternSyntax::default())
}

fn toolchain() -> Toolchain {
    Toolchain::builtin().unwrap()
}

/// A small module: an app, two libraries, one unused tool and an
/// internal package whose identity doesn't mirror its directory.
fn monorepo() -> PackageGraph {
    PackageGraph::from_records([
        PackageRecord::new("example.com/repo/cmd/app", "/src/cmd/app")
            .with_deps(["example.com/repo/lib/log", "fmt", "os"])
            .with_go_files(["main.go"])
            .with_test_go_files(["main_test.go"]),
        PackageRecord::new("example.com/repo/lib/log", "/src/lib/log")
            .with_deps(["example.com/repo/lib/fmtx", "github.com/other/dep"])
            .with_go_files(["log.go"])
            .with_xtest_go_files(["log_ext_test.go"])
            .with_other_files(["README.md", "testdata/golden.txt"]),
        PackageRecord::new("example.com/repo/lib/fmtx", "/src/lib/fmtx")
            .with_go_files(["fmtx.go"]),
        PackageRecord::new("example.com/repo/tools/gen", "/src/tools/gen")
            .with_go_files(["gen.go"]),
        PackageRecord::new("internal/vendored", "/src/third_party/vendored/pkg")
            .with_go_files(["v.go"]),
    ])
}

fn selected(graph: &PackageGraph, patterns: &str) -> Vec<String> {
    let patterns = parse_pattern_list(patterns, &PatternSyntax::default());
    graph
        .select(&patterns)
        .iter()
        .map(str::to_string)
        .collect()
}

#[test]
fn test_exact_identity_matches() {
    assert!(pattern("example.com/repo/cmd/app")
        .matches("example.com/repo/cmd/app", Path::new("/src/cmd/app")));
}

#[test]
fn test_last_segment_matches() {
    assert!(pattern("app").matches("example.com/repo/cmd/app", Path::new("/src/cmd/app")));
    assert!(!pattern("ap").matches("example.com/repo/cmd/app", Path::new("/src/cmd/app")));
}

#[test]
fn test_identity_suffix_matches() {
    assert!(pattern("cmd/app").matches("example.com/repo/cmd/app", Path::new("/elsewhere")));
}

#[test]
fn test_directory_suffix_matches() {
    assert!(pattern("vendored/pkg")
        .matches("internal/vendored", Path::new("/src/third_party/vendored/pkg")));
}

#[test]
fn test_matching_is_case_sensitive() {
    assert!(!pattern("App").matches("example.com/repo/cmd/app", Path::new("/src/cmd/app")));
}

#[test]
fn test_everything_pattern_matches_any_package() {
    let p = pattern("./...");
    assert!(p.matches("anything", Path::new("/x")));
    assert!(p.matches("example.com/repo/cmd/app", Path::new("/src/cmd/app")));
}

#[test]
fn test_subtree_pattern_matches_identity_prefix_and_suffix() {
    let p = pattern("lib/...");
    assert!(p.matches("lib/log", Path::new("/nowhere")));
    assert!(p.matches("example.com/repo/lib", Path::new("/nowhere")));
    assert!(!p.matches("example.com/repo/library/x", Path::new("/src/library/x")));
}

#[test]
fn test_subtree_pattern_matches_directory_substring() {
    let p = pattern("third_party/...");
    assert!(p.matches("internal/vendored", Path::new("/src/third_party/vendored/pkg")));
}

#[test]
fn test_subtree_pattern_does_not_match_bare_prefix_identity() {
    // Neither `/lib` suffix, `lib/` prefix, nor `/lib/` in the directory
    assert!(!pattern("lib/...").matches("lib", Path::new("/src")));
}

#[test]
fn test_subtree_pattern_requires_segment_boundary() {
    let p = pattern("a/...");
    assert!(p.matches("a/b", Path::new("/src/a/b")));
    assert!(!p.matches("ab", Path::new("/src/ab")));
}

#[test]
fn test_trailing_directory_segment_matches_despite_identity() {
    assert!(pattern("pkg1").matches("example.com/other/name", Path::new("/src/pkg1")));
}

#[test]
fn test_pattern_list_parsing() {
    let patterns = parse_pattern_list(" app , lib/log/ ,, ", &PatternSyntax::default());
    let raw: Vec<&str> = patterns.iter().map(PackagePattern::as_str).collect();
    assert_eq!(raw, vec!["app", "lib/log"]);
    assert!(parse_pattern_list(" , ,", &PatternSyntax::default()).is_empty());
}

#[test]
fn test_select_unions_patterns() {
    let graph = monorepo();
    assert_eq!(
        selected(&graph, "app,gen"),
        vec!["example.com/repo/cmd/app", "example.com/repo/tools/gen"]
    );
}

#[test]
fn test_select_with_unmatched_pattern_is_not_an_error() {
    let graph = monorepo();
    assert!(selected(&graph, "does-not-exist").is_empty());
}

#[test]
fn test_closure_follows_in_tree_dependencies_only() {
    let graph = monorepo();
    let mut keep: KeepSet = ["example.com/repo/cmd/app"].into_iter().collect();
    let added = graph.close(&mut keep);

    assert_eq!(added, 2);
    let kept: Vec<&str> = keep.iter().collect();
    assert_eq!(
        kept,
        vec![
            "example.com/repo/cmd/app",
            "example.com/repo/lib/fmtx",
            "example.com/repo/lib/log",
        ]
    );
    assert!(!keep.contains("fmt"));
    assert!(!keep.contains("github.com/other/dep"));
}

#[test]
fn test_closure_is_idempotent() {
    let graph = monorepo();
    let mut keep: KeepSet = ["example.com/repo/cmd/app"].into_iter().collect();
    graph.close(&mut keep);
    let once = keep.clone();

    assert_eq!(graph.close(&mut keep), 0);
    assert_eq!(keep, once);
}

#[test]
fn test_closure_is_monotonic() {
    let graph = monorepo();

    let mut small: KeepSet = ["example.com/repo/lib/log"].into_iter().collect();
    graph.close(&mut small);

    let mut large: KeepSet = ["example.com/repo/lib/log", "example.com/repo/tools/gen"]
        .into_iter()
        .collect();
    graph.close(&mut large);

    assert!(small.iter().all(|identity| large.contains(identity)));
}

#[test]
fn test_external_identities_in_keep_set_are_inert() {
    let graph = monorepo();
    let mut keep: KeepSet = ["github.com/other/dep"].into_iter().collect();
    assert_eq!(graph.close(&mut keep), 0);
    assert_eq!(keep.len(), 1);
    assert!(graph.project(&keep, true, &toolchain()).is_empty());
}

#[test]
fn test_projection_without_tests() {
    let mut graph = monorepo();
    let patterns = parse_pattern_list("log", &PatternSyntax::default());
    let resolution = graph.resolve(&patterns, false, &toolchain(), None);

    let mut files = resolution.files;
    files.sort();
    assert_eq!(
        files,
        vec![
            PathBuf::from("/src/lib/fmtx/fmtx.go"),
            PathBuf::from("/src/lib/log/README.md"),
            PathBuf::from("/src/lib/log/log.go"),
        ]
    );
}

#[test]
fn test_projection_with_tests() {
    let mut graph = monorepo();
    let patterns = parse_pattern_list("log", &PatternSyntax::default());
    let resolution = graph.resolve(&patterns, true, &toolchain(), None);

    let files = resolution.files;
    assert!(files.contains(&PathBuf::from("/src/lib/log/log_ext_test.go")));
    assert!(files.contains(&PathBuf::from("/src/lib/log/testdata/golden.txt")));
    assert!(!files.contains(&PathBuf::from("/src/cmd/app/main_test.go")));
}

#[test]
fn test_projection_excludes_unkept_packages() {
    let mut graph = monorepo();
    let patterns = parse_pattern_list("app", &PatternSyntax::default());
    let resolution = graph.resolve(&patterns, true, &toolchain(), None);

    assert!(resolution
        .files
        .iter()
        .all(|path| !path.starts_with("/src/tools") && !path.starts_with("/src/third_party")));
}
