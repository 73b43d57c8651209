// Detect command: map a file to its registered language and parser artifact

use std::path::{Path, PathBuf};

use crate::compiler::{artifact_path, Platform};
use crate::config::SetupConfig;
use crate::error::{exit_codes, Result};
use crate::user_output::UserOutput;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub language: String,
    pub artifact: PathBuf,
    pub artifact_present: bool,
}

pub fn detect_file(config: &SetupConfig, file: &Path) -> Option<Detection> {
    let spec = config.registry.detect_language(file)?;
    let artifact = artifact_path(&config.paths.output_dir, &spec.id, Platform::current());

    Some(Detection {
        language: spec.id.clone(),
        artifact_present: artifact.is_file(),
        artifact,
    })
}

/// Print the detection; exits non-zero when no language matches
pub fn execute_detect_command(
    config: &SetupConfig,
    file: &Path,
    output: &UserOutput,
) -> Result<i32> {
    match detect_file(config, file) {
        Some(detection) => {
            output.show_status(&format!("Language: {}", detection.language));
            let state = if detection.artifact_present {
                "installed"
            } else {
                "not installed"
            };
            output.show_status(&format!(
                "Parser:   {} ({state})",
                detection.artifact.display()
            ));
            Ok(exit_codes::SUCCESS)
        }
        None => {
            output.show_warning(&format!("No registered language for {}", file.display()));
            Ok(exit_codes::INSTALL_FAILURE)
        }
    }
}
