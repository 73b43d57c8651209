// Info command: report directories, the active toolchain and per-language install state

use std::path::PathBuf;

use crate::compiler::{artifact_path, detect_toolchain, Platform};
use crate::config::SetupConfig;
use crate::error::Result;
use crate::ledger::InstallLedger;
use crate::registry::LanguageSpec;
use crate::user_output::{LanguageStatusRow, UserOutput};

#[derive(Debug, Clone)]
pub struct InstallationInfo {
    pub install_dir: PathBuf,
    pub parsers_dir: PathBuf,
    pub output_dir: PathBuf,
    pub ledger_file: PathBuf,
    /// Toolchain that an install would use, if any
    pub toolchain: Option<String>,
    pub languages: Vec<LanguageStatusRow>,
}

/// Whether the clone for `spec` contains a generated parser
fn source_present(config: &SetupConfig, spec: &LanguageSpec) -> bool {
    let mut root = config.paths.clone_dir(&spec.id);
    if let Some(subpath) = &spec.subpath {
        root.push(subpath);
    }
    root.join("src").join("parser.c").is_file()
}

/// Gather the report without printing anything
pub fn collect_info(config: &SetupConfig) -> Result<InstallationInfo> {
    let platform = Platform::current();
    let ledger = InstallLedger::load(&config.paths.ledger_file)?;

    let toolchain = detect_toolchain(platform, config.preferred_toolchain, |name| {
        which::which(name).ok()
    })
    .ok()
    .map(|t| t.kind().to_string());

    let languages = config
        .registry
        .list()
        .iter()
        .map(|spec| LanguageStatusRow {
            language: spec.id.clone(),
            source_present: source_present(config, spec),
            binary_present: artifact_path(&config.paths.output_dir, &spec.id, platform).is_file(),
            recorded: ledger.get(&spec.id).map(|r| r.status),
        })
        .collect();

    Ok(InstallationInfo {
        install_dir: config.paths.install_dir.clone(),
        parsers_dir: config.paths.parsers_dir.clone(),
        output_dir: config.paths.output_dir.clone(),
        ledger_file: config.paths.ledger_file.clone(),
        toolchain,
        languages,
    })
}

pub fn execute_info_command(config: &SetupConfig, output: &UserOutput) -> Result<InstallationInfo> {
    let info = collect_info(config)?;

    output.show_info_header("Install dir:", &info.install_dir.display().to_string());
    output.show_info_header("Sources:", &info.parsers_dir.display().to_string());
    output.show_info_header("Parsers:", &info.output_dir.display().to_string());
    output.show_info_header("Ledger:", &info.ledger_file.display().to_string());
    output.show_info_header("Toolchain:", info.toolchain.as_deref().unwrap_or("none found"));
    output.show_info_rows(&info.languages);

    Ok(info)
}
