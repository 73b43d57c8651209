// Clean command: remove built parsers, intermediates and the ledger, optionally the clones

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::compiler::{artifact_path, Platform};
use crate::config::SetupConfig;
use crate::error::Result;
use crate::ledger::{InstallLedger, InstallLock};

/// Configuration for clean operations
#[derive(Debug, Clone, Default)]
pub struct CleanConfig {
    /// Also remove the grammar clones
    pub sources: bool,
}

/// Result of a cleanup operation
#[derive(Debug, Default)]
pub struct CleanupResult {
    pub removed: Vec<PathBuf>,
}

fn remove(path: &Path, result: &mut CleanupResult) -> Result<()> {
    let removal = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match removal {
        Ok(()) => {
            debug!(path = %path.display(), "Removed");
            result.removed.push(path.to_path_buf());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub fn execute_clean_command(config: &SetupConfig, clean: &CleanConfig) -> Result<CleanupResult> {
    let paths = &config.paths;
    let mut result = CleanupResult::default();

    // A missing install dir is not created just to lock it; an explicit
    // output directory elsewhere may still hold parsers
    let _lock = if paths.install_dir.exists() {
        Some(InstallLock::acquire(&paths.install_dir)?)
    } else {
        None
    };
    let ledger = InstallLedger::load(&paths.ledger_file)?;
    let platform = Platform::current();

    // Only files this tool produced; the output directory may be shared
    let mut artifacts: Vec<PathBuf> = config
        .registry
        .list()
        .iter()
        .map(|spec| artifact_path(&paths.output_dir, &spec.id, platform))
        .collect();
    artifacts.extend(ledger.records().filter_map(|r| r.artifact_path.clone()));
    artifacts.sort();
    artifacts.dedup();

    for artifact in &artifacts {
        remove(artifact, &mut result)?;
    }

    remove(&paths.objects_dir, &mut result)?;
    remove(&paths.ledger_file, &mut result)?;
    if clean.sources {
        remove(&paths.parsers_dir, &mut result)?;
    }

    Ok(result)
}
