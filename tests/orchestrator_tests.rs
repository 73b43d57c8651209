// End-to-end install runs over local fixture repositories

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use ts_setup::compiler::{artifact_path, CompileResult, Compiler, ParserCompiler, Platform, ToolchainKind};
use ts_setup::error::{exit_codes, CompileError, FetchErrorKind, Result, SetupError};
use ts_setup::fetcher::{FetchOutcome, GitFetcher};
use ts_setup::ledger::{InstallLedger, InstallStatus, LEDGER_FILE_NAME};
use ts_setup::orchestrator::{InstallOptions, InstallOrchestrator, LanguageOutcome};
use ts_setup::registry::LanguageSpec;

use test_utils::{create_grammar_repo, have_c_compiler, local_spec, unreachable_spec};

/// Writes an empty artifact instead of invoking a toolchain; fails for selected languages
#[derive(Default)]
struct FakeCompiler {
    failing: HashSet<String>,
    calls: RefCell<Vec<String>>,
}

impl FakeCompiler {
    fn failing(languages: &[&str]) -> Self {
        Self {
            failing: languages.iter().map(|l| l.to_string()).collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl Compiler for &FakeCompiler {
    fn compile(
        &self,
        source_root: &Path,
        spec: &LanguageSpec,
        output_dir: &Path,
    ) -> Result<CompileResult> {
        self.calls.borrow_mut().push(spec.id.clone());
        assert!(source_root.join("src").join("parser.c").is_file());

        if self.failing.contains(&spec.id) {
            return Err(CompileError::NonZeroExit {
                language: spec.id.clone(),
                command: "cc".to_string(),
                exit_code: Some(1),
                stderr_excerpt: "parser.c:1:1: error: expected declaration".to_string(),
            }
            .into());
        }

        fs::create_dir_all(output_dir)?;
        let artifact = artifact_path(output_dir, &spec.id, Platform::current());
        fs::write(&artifact, b"")?;
        Ok(CompileResult {
            artifact,
            toolchain: ToolchainKind::Gcc,
            sources: Vec::new(),
            duration: Duration::ZERO,
        })
    }
}

struct Fixture {
    upstream: TempDir,
    install: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            upstream: TempDir::new().unwrap(),
            install: TempDir::new().unwrap(),
        }
    }

    fn spec(&self, language: &str) -> LanguageSpec {
        let repo = create_grammar_repo(self.upstream.path(), language, None);
        local_spec(language, &repo)
    }

    fn options(&self, force: bool) -> InstallOptions {
        InstallOptions {
            parsers_dir: self.install.path().join("parsers"),
            output_dir: self.install.path().join("build"),
            force,
        }
    }

    fn ledger(&self) -> InstallLedger {
        InstallLedger::load(self.install.path().join(LEDGER_FILE_NAME)).unwrap()
    }
}

#[test]
fn test_two_languages_succeed() {
    let fixture = Fixture::new();
    let python = fixture.spec("python");
    let json = fixture.spec("json");
    let compiler = FakeCompiler::default();
    let mut ledger = fixture.ledger();

    let summary = InstallOrchestrator::new(GitFetcher::new(), &compiler, fixture.options(false))
        .run(&mut ledger, &[&python, &json])
        .unwrap();

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 0);
    assert_eq!(summary.exit_code(), exit_codes::SUCCESS);
    assert!(ledger.is_installed("python"));
    assert!(ledger.is_installed("json"));
    assert!(fixture.install.path().join("parsers").join("json").join(".git").exists());
    match summary.outcome("python") {
        Some(LanguageOutcome::Installed { artifact, fetch }) => {
            assert!(artifact.is_file());
            assert_eq!(*fetch, FetchOutcome::Cloned);
        }
        other => panic!("expected installed, got {other:?}"),
    }
}

#[test]
fn test_unreachable_language_fails_alone() {
    let fixture = Fixture::new();
    let python = fixture.spec("python");
    let badlang = unreachable_spec(&fixture.upstream, "badlang");
    let compiler = FakeCompiler::default();
    let mut ledger = fixture.ledger();

    let summary = InstallOrchestrator::new(GitFetcher::new(), &compiler, fixture.options(false))
        .run(&mut ledger, &[&python, &badlang])
        .unwrap();

    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.exit_code(), exit_codes::INSTALL_FAILURE);

    let failures = summary.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "badlang");
    match failures[0].1 {
        SetupError::Fetch(e) => assert_eq!(e.kind, FetchErrorKind::NetworkFailure),
        other => panic!("expected fetch failure, got {other:?}"),
    }

    let record = ledger.get("badlang").unwrap();
    assert_eq!(record.status, InstallStatus::Failed);
    assert!(record.error.as_deref().unwrap().contains("NetworkFailure"));
    assert_eq!(compiler.calls(), vec!["python"]);
}

#[test]
fn test_compile_failure_does_not_stop_later_languages() {
    let fixture = Fixture::new();
    let specs: Vec<LanguageSpec> = ["c", "go", "rust"].iter().map(|l| fixture.spec(l)).collect();
    let selected: Vec<&LanguageSpec> = specs.iter().collect();
    let compiler = FakeCompiler::failing(&["go"]);
    let mut ledger = fixture.ledger();

    let summary = InstallOrchestrator::new(GitFetcher::new(), &compiler, fixture.options(false))
        .run(&mut ledger, &selected)
        .unwrap();

    assert_eq!(summary.succeeded(), 2);
    assert_eq!(summary.failed(), 1);
    assert!(ledger.is_installed("c"));
    assert!(!ledger.is_installed("go"));
    assert!(ledger.is_installed("rust"));
    assert_eq!(compiler.calls(), vec!["c", "go", "rust"]);
}

#[test]
fn test_second_run_is_idempotent() {
    let fixture = Fixture::new();
    let python = fixture.spec("python");
    let json = fixture.spec("json");
    let compiler = FakeCompiler::default();

    let mut ledger = fixture.ledger();
    InstallOrchestrator::new(GitFetcher::new(), &compiler, fixture.options(false))
        .run(&mut ledger, &[&python, &json])
        .unwrap();
    let ledger_path = fixture.install.path().join(LEDGER_FILE_NAME);
    let before = fs::read_to_string(&ledger_path).unwrap();

    let second = FakeCompiler::default();
    let mut ledger = fixture.ledger();
    let summary = InstallOrchestrator::new(GitFetcher::new(), &second, fixture.options(false))
        .run(&mut ledger, &[&python, &json])
        .unwrap();

    assert_eq!(summary.skipped(), 2);
    assert_eq!(summary.succeeded(), 0);
    assert_eq!(summary.exit_code(), exit_codes::SUCCESS);
    assert!(second.calls().is_empty());
    assert_eq!(fs::read_to_string(&ledger_path).unwrap(), before);
}

#[test]
fn test_retry_rebuilds_only_failed_languages() {
    let fixture = Fixture::new();
    let python = fixture.spec("python");
    let json = fixture.spec("json");

    let first = FakeCompiler::failing(&["json"]);
    let mut ledger = fixture.ledger();
    InstallOrchestrator::new(GitFetcher::new(), &first, fixture.options(false))
        .run(&mut ledger, &[&python, &json])
        .unwrap();
    assert!(!ledger.is_installed("json"));

    let second = FakeCompiler::default();
    let mut ledger = fixture.ledger();
    let summary = InstallOrchestrator::new(GitFetcher::new(), &second, fixture.options(false))
        .run(&mut ledger, &[&python, &json])
        .unwrap();

    assert_eq!(second.calls(), vec!["json"]);
    assert_eq!(summary.skipped(), 1);
    assert_eq!(summary.succeeded(), 1);
    assert!(ledger.is_installed("json"));
    match summary.outcome("json") {
        Some(LanguageOutcome::Installed { fetch, .. }) => assert_eq!(*fetch, FetchOutcome::Updated),
        other => panic!("expected installed, got {other:?}"),
    }
}

#[test]
fn test_force_rebuilds_installed_languages() {
    let fixture = Fixture::new();
    let json = fixture.spec("json");

    let compiler = FakeCompiler::default();
    let mut ledger = fixture.ledger();
    InstallOrchestrator::new(GitFetcher::new(), &compiler, fixture.options(false))
        .run(&mut ledger, &[&json])
        .unwrap();

    let forced = FakeCompiler::default();
    let summary = InstallOrchestrator::new(GitFetcher::new(), &forced, fixture.options(true))
        .run(&mut ledger, &[&json])
        .unwrap();
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(forced.calls(), vec!["json"]);
}

#[test]
fn test_legacy_ledger_languages_are_rebuilt() {
    let fixture = Fixture::new();
    let json = fixture.spec("json");
    fs::write(fixture.install.path().join(LEDGER_FILE_NAME), r#"["json"]"#).unwrap();

    let compiler = FakeCompiler::default();
    let mut ledger = fixture.ledger();
    let summary = InstallOrchestrator::new(GitFetcher::new(), &compiler, fixture.options(false))
        .run(&mut ledger, &[&json])
        .unwrap();

    assert_eq!(summary.skipped(), 0);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(compiler.calls(), vec!["json"]);
    let artifact = artifact_path(&fixture.install.path().join("build"), "json", Platform::current());
    assert!(artifact.is_file());
    assert!(ledger.is_installed("json"));
}

#[test]
fn test_corrupt_clone_recovered_during_install() {
    let fixture = Fixture::new();
    let css = fixture.spec("css");

    let clone_dir = fixture.install.path().join("parsers").join("css");
    fs::create_dir_all(&clone_dir).unwrap();
    fs::write(clone_dir.join("half-written"), "x").unwrap();

    let compiler = FakeCompiler::default();
    let mut ledger = fixture.ledger();
    let summary = InstallOrchestrator::new(GitFetcher::new(), &compiler, fixture.options(false))
        .run(&mut ledger, &[&css])
        .unwrap();

    assert_eq!(summary.succeeded(), 1);
    match summary.outcome("css") {
        Some(LanguageOutcome::Installed { fetch, .. }) => {
            assert_eq!(*fetch, FetchOutcome::Recovered)
        }
        other => panic!("expected installed, got {other:?}"),
    }
    assert!(!clone_dir.join("half-written").exists());
}

#[test]
fn test_real_toolchain_install() {
    if !have_c_compiler() {
        return;
    }
    let fixture = Fixture::new();
    let python = fixture.spec("python");
    let json = fixture.spec("json");
    let compiler = ParserCompiler::detect(
        Platform::current(),
        None,
        fixture.install.path().join("objects"),
    );
    let mut ledger = fixture.ledger();

    let summary = InstallOrchestrator::new(GitFetcher::new(), compiler, fixture.options(false))
        .run(&mut ledger, &[&python, &json])
        .unwrap();

    assert_eq!(summary.succeeded(), 2, "failures: {:?}", summary.failures());
    for language in ["python", "json"] {
        let artifact = artifact_path(
            &fixture.install.path().join("build"),
            language,
            Platform::current(),
        );
        assert!(artifact.is_file());
        assert_eq!(
            ledger.get(language).and_then(|r| r.artifact_path.clone()),
            Some(artifact)
        );
    }
}
