// Install command: resolve the requested languages and drive the orchestrator

use tracing::debug;

use crate::compiler::{ParserCompiler, Platform};
use crate::config::SetupConfig;
use crate::error::Result;
use crate::fetcher::GitFetcher;
use crate::ledger::{InstallLedger, InstallLock};
use crate::orchestrator::{InstallOptions, InstallOrchestrator, InstallSummary};
use crate::user_output::UserOutput;

/// Configuration for an install run
#[derive(Debug, Clone, Default)]
pub struct InstallConfig {
    /// Language identifiers to install; empty means every registered language
    pub languages: Vec<String>,
    pub force: bool,
}

/// Run the install with the real git fetcher and the detected toolchain
pub fn execute_install_command(
    config: &SetupConfig,
    install: &InstallConfig,
    output: &UserOutput,
) -> Result<InstallSummary> {
    let specs = config.registry.select(&install.languages)?;
    let paths = &config.paths;

    let _lock = InstallLock::acquire(&paths.install_dir)?;
    let mut ledger = InstallLedger::load(&paths.ledger_file)?;

    let compiler = ParserCompiler::detect(
        Platform::current(),
        config.preferred_toolchain,
        paths.objects_dir.clone(),
    );
    if let Some(toolchain) = compiler.toolchain() {
        debug!(toolchain = %toolchain.kind(), "Using toolchain");
    }

    let options = InstallOptions {
        parsers_dir: paths.parsers_dir.clone(),
        output_dir: paths.output_dir.clone(),
        force: install.force,
    };

    output.show_status(&format!(
        "Installing {} language(s) into {}",
        specs.len(),
        paths.output_dir.display()
    ));

    let mut orchestrator = InstallOrchestrator::new(GitFetcher::new(), compiler, options)
        .with_progress(|language, state| output.show_state(language, state));
    let summary = orchestrator.run(&mut ledger, &specs)?;

    output.show_summary(&summary);
    Ok(summary)
}
