// Repository fetcher tests against local fixture repositories

use std::fs;
use tempfile::TempDir;
use ts_setup::error::{FetchErrorKind, SetupError};
use ts_setup::fetcher::{open_valid_clone, FetchOutcome, Fetcher, GitFetcher};

use test_utils::{commit_all, create_grammar_repo, local_spec, unreachable_spec};

#[test]
fn test_fresh_clone() {
    let upstream = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let repo_dir = create_grammar_repo(upstream.path(), "json", None);
    let destination = workspace.path().join("parsers").join("json");

    let result = GitFetcher::new()
        .fetch(&local_spec("json", &repo_dir), &destination)
        .unwrap();

    assert_eq!(result.outcome, FetchOutcome::Cloned);
    assert_eq!(result.source_root, destination);
    assert!(destination.join("src").join("parser.c").is_file());
    assert!(open_valid_clone(&destination).is_some());
}

#[test]
fn test_subpath_source_root() {
    let upstream = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let repo_dir = create_grammar_repo(upstream.path(), "php", Some("php"));
    let destination = workspace.path().join("php");

    let spec = local_spec("php", &repo_dir).with_subpath("php");
    let result = GitFetcher::new().fetch(&spec, &destination).unwrap();

    assert_eq!(result.clone_dir, destination);
    assert_eq!(result.source_root, destination.join("php"));
    assert!(result.source_root.join("src").join("parser.c").is_file());
}

#[test]
fn test_existing_clone_is_updated() {
    let upstream = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let repo_dir = create_grammar_repo(upstream.path(), "go", None);
    let destination = workspace.path().join("go");
    let spec = local_spec("go", &repo_dir);
    let fetcher = GitFetcher::new();

    fetcher.fetch(&spec, &destination).unwrap();

    // New upstream commit
    fs::write(repo_dir.join("grammar.js"), "module.exports = {};\n").unwrap();
    let upstream_repo = git2::Repository::open(&repo_dir).unwrap();
    let head = commit_all(&upstream_repo, "Add grammar.js");

    let result = fetcher.fetch(&spec, &destination).unwrap();
    assert_eq!(result.outcome, FetchOutcome::Updated);
    assert!(destination.join("grammar.js").is_file());

    let clone = git2::Repository::open(&destination).unwrap();
    assert_eq!(clone.head().unwrap().target(), Some(head));
}

#[test]
fn test_failed_update_keeps_existing_sources() {
    let upstream = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let repo_dir = create_grammar_repo(upstream.path(), "ruby", None);
    let destination = workspace.path().join("ruby");
    let spec = local_spec("ruby", &repo_dir);
    let fetcher = GitFetcher::new();

    fetcher.fetch(&spec, &destination).unwrap();
    fs::remove_dir_all(&repo_dir).unwrap();

    let result = fetcher.fetch(&spec, &destination).unwrap();
    assert_eq!(result.outcome, FetchOutcome::Stale);
    assert!(destination.join("src").join("parser.c").is_file());
}

#[test]
fn test_incomplete_worktree_is_restored() {
    let upstream = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let repo_dir = create_grammar_repo(upstream.path(), "bash", None);
    let destination = workspace.path().join("bash");
    let spec = local_spec("bash", &repo_dir);
    let fetcher = GitFetcher::new();

    fetcher.fetch(&spec, &destination).unwrap();

    // HEAD already points at the upstream commit but the checkout never finished
    let parser = destination.join("src").join("parser.c");
    fs::remove_file(&parser).unwrap();

    let result = fetcher.fetch(&spec, &destination).unwrap();
    assert_eq!(result.outcome, FetchOutcome::Updated);
    assert!(parser.is_file());
}

#[test]
fn test_stale_clone_worktree_is_restored() {
    let upstream = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let repo_dir = create_grammar_repo(upstream.path(), "lua", None);
    let destination = workspace.path().join("lua");
    let spec = local_spec("lua", &repo_dir);
    let fetcher = GitFetcher::new();

    fetcher.fetch(&spec, &destination).unwrap();
    fs::remove_dir_all(&repo_dir).unwrap();

    let parser = destination.join("src").join("parser.c");
    fs::write(&parser, "half written").unwrap();

    let result = fetcher.fetch(&spec, &destination).unwrap();
    assert_eq!(result.outcome, FetchOutcome::Stale);
    assert!(fs::read_to_string(&parser)
        .unwrap()
        .contains("tree_sitter_lua"));
}

#[test]
fn test_corrupt_destination_is_recloned() {
    let upstream = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let repo_dir = create_grammar_repo(upstream.path(), "css", None);
    let destination = workspace.path().join("css");

    // Leftover from an interrupted clone
    fs::create_dir_all(destination.join(".git")).unwrap();
    fs::write(destination.join("partial.tmp"), "junk").unwrap();

    let result = GitFetcher::new()
        .fetch(&local_spec("css", &repo_dir), &destination)
        .unwrap();

    assert_eq!(result.outcome, FetchOutcome::Recovered);
    assert!(!destination.join("partial.tmp").exists());
    assert!(destination.join("src").join("parser.c").is_file());
}

#[test]
fn test_plain_file_destination_is_replaced() {
    let upstream = TempDir::new().unwrap();
    let workspace = TempDir::new().unwrap();
    let repo_dir = create_grammar_repo(upstream.path(), "toml", None);
    let destination = workspace.path().join("toml");
    fs::write(&destination, "not a directory").unwrap();

    let result = GitFetcher::new()
        .fetch(&local_spec("toml", &repo_dir), &destination)
        .unwrap();
    assert_eq!(result.outcome, FetchOutcome::Recovered);
    assert!(destination.is_dir());
}

#[test]
fn test_unreachable_repository_is_network_failure() {
    let workspace = TempDir::new().unwrap();
    let spec = unreachable_spec(&workspace, "badlang");

    let err = GitFetcher::new()
        .fetch(&spec, &workspace.path().join("parsers").join("badlang"))
        .unwrap_err();

    match err {
        SetupError::Fetch(e) => {
            assert_eq!(e.kind, FetchErrorKind::NetworkFailure);
            assert_eq!(e.language, "badlang");
            assert_eq!(e.url, spec.repository);
        }
        other => panic!("expected fetch error, got {other:?}"),
    }
}
