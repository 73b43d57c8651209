// Install orchestration: drives each selected language through fetch, compile and record

use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::compiler::Compiler;
use crate::error::{exit_codes, Result, SetupError};
use crate::fetcher::{FetchOutcome, Fetcher};
use crate::ledger::{InstallLedger, InstallRecord, InstallStatus};
use crate::logging::utils::language_span;
use crate::registry::LanguageSpec;

/// Position of one language in the install pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageState {
    Pending,
    /// Already recorded as a success and not forced
    Skipped,
    Fetching,
    Compiling,
    Recorded(InstallStatus),
}

impl fmt::Display for LanguageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanguageState::Pending => write!(f, "pending"),
            LanguageState::Skipped => write!(f, "skipped"),
            LanguageState::Fetching => write!(f, "fetching"),
            LanguageState::Compiling => write!(f, "compiling"),
            LanguageState::Recorded(InstallStatus::Success) => write!(f, "installed"),
            LanguageState::Recorded(InstallStatus::Failed) => write!(f, "failed"),
        }
    }
}

/// Where the orchestrator puts clones and artifacts
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Parent of the per-language clones
    pub parsers_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Rebuild languages already recorded as installed
    pub force: bool,
}

#[derive(Debug)]
pub enum LanguageOutcome {
    Skipped,
    Installed {
        artifact: PathBuf,
        fetch: FetchOutcome,
    },
    Failed {
        error: SetupError,
    },
}

/// Result of one orchestrator run, in the order languages were processed
#[derive(Debug, Default)]
pub struct InstallSummary {
    pub outcomes: Vec<(String, LanguageOutcome)>,
    pub duration: Duration,
}

impl InstallSummary {
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, LanguageOutcome::Skipped))
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, LanguageOutcome::Installed { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, LanguageOutcome::Failed { .. }))
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Failed languages with the error that stopped them
    pub fn failures(&self) -> Vec<(&str, &SetupError)> {
        self.outcomes
            .iter()
            .filter_map(|(language, outcome)| match outcome {
                LanguageOutcome::Failed { error } => Some((language.as_str(), error)),
                _ => None,
            })
            .collect()
    }

    pub fn outcome(&self, language: &str) -> Option<&LanguageOutcome> {
        self.outcomes
            .iter()
            .find(|(l, _)| l == language)
            .map(|(_, o)| o)
    }

    pub fn exit_code(&self) -> i32 {
        if self.failed() == 0 {
            exit_codes::SUCCESS
        } else {
            exit_codes::INSTALL_FAILURE
        }
    }

    fn count(&self, predicate: impl Fn(&LanguageOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| predicate(o)).count()
    }
}

type ProgressCallback<'a> = Box<dyn FnMut(&str, LanguageState) + 'a>;

/// Sequential installer over a fetcher and a compiler
pub struct InstallOrchestrator<'a, F: Fetcher, C: Compiler> {
    fetcher: F,
    compiler: C,
    options: InstallOptions,
    progress: Option<ProgressCallback<'a>>,
}

impl<'a, F: Fetcher, C: Compiler> InstallOrchestrator<'a, F, C> {
    pub fn new(fetcher: F, compiler: C, options: InstallOptions) -> Self {
        Self {
            fetcher,
            compiler,
            options,
            progress: None,
        }
    }

    /// Receive every state transition as it happens
    pub fn with_progress(mut self, callback: impl FnMut(&str, LanguageState) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    fn transition(&mut self, language: &str, state: LanguageState) {
        debug!(language, state = %state, "State transition");
        if let Some(progress) = self.progress.as_mut() {
            progress(language, state);
        }
    }

    /// Install `specs` in order. Per-language failures are recorded and the run
    /// continues; only ledger I/O and a missing toolchain abort it.
    pub fn run(
        &mut self,
        ledger: &mut InstallLedger,
        specs: &[&LanguageSpec],
    ) -> Result<InstallSummary> {
        let start = Instant::now();
        let mut summary = InstallSummary::default();
        let mut compile_attempted = false;

        info!(count = specs.len(), force = self.options.force, "Starting install");

        for spec in specs {
            let language = spec.id.as_str();
            let _span = language_span(language).entered();
            self.transition(language, LanguageState::Pending);

            if !self.options.force && ledger.is_installed(language) {
                debug!(language, "Already installed, skipping");
                self.transition(language, LanguageState::Skipped);
                summary
                    .outcomes
                    .push((language.to_string(), LanguageOutcome::Skipped));
                continue;
            }

            self.transition(language, LanguageState::Fetching);
            let destination = self.options.parsers_dir.join(language);
            let fetched = match self.fetcher.fetch(spec, &destination) {
                Ok(fetched) => fetched,
                Err(error) => {
                    self.record_failure(ledger, &mut summary, language, error)?;
                    continue;
                }
            };

            self.transition(language, LanguageState::Compiling);
            let first_attempt = !compile_attempted;
            compile_attempted = true;

            match self
                .compiler
                .compile(&fetched.source_root, spec, &self.options.output_dir)
            {
                Ok(compiled) => {
                    ledger.record(InstallRecord::success(language, compiled.artifact.clone()))?;
                    self.transition(language, LanguageState::Recorded(InstallStatus::Success));
                    summary.outcomes.push((
                        language.to_string(),
                        LanguageOutcome::Installed {
                            artifact: compiled.artifact,
                            fetch: fetched.outcome,
                        },
                    ));
                }
                Err(error @ SetupError::NoCompilerFound { .. }) if first_attempt => {
                    return Err(error);
                }
                Err(error) => {
                    self.record_failure(ledger, &mut summary, language, error)?;
                }
            }
        }

        summary.duration = start.elapsed();
        info!(
            skipped = summary.skipped(),
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            duration_ms = summary.duration.as_millis() as u64,
            "Install finished"
        );

        Ok(summary)
    }

    fn record_failure(
        &mut self,
        ledger: &mut InstallLedger,
        summary: &mut InstallSummary,
        language: &str,
        error: SetupError,
    ) -> Result<()> {
        warn!(language, error = %error, "Install failed");
        ledger.record(InstallRecord::failed(language, error.to_string()))?;
        self.transition(language, LanguageState::Recorded(InstallStatus::Failed));
        summary
            .outcomes
            .push((language.to_string(), LanguageOutcome::Failed { error }));
        Ok(())
    }
}
