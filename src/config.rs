// Run configuration: install directory layout, registry source and toolchain preference
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::compiler::ToolchainKind;
use crate::error::{ConfigError, Result};
use crate::ledger::LEDGER_FILE_NAME;
use crate::registry::LanguageRegistry;

/// Overrides the default install directory
pub const HOME_ENV_VAR: &str = "TS_SETUP_HOME";
/// Directory created under the user's home when no override is given
pub const DEFAULT_DIR_NAME: &str = ".tree-sitter";

/// Filesystem layout of an install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPaths {
    pub install_dir: PathBuf,
    /// One clone per language: `<install_dir>/parsers/<id>`
    pub parsers_dir: PathBuf,
    /// Compiler intermediates: `<install_dir>/objects/<id>`
    pub objects_dir: PathBuf,
    pub output_dir: PathBuf,
    pub ledger_file: PathBuf,
}

impl InstallPaths {
    pub fn new(install_dir: PathBuf, output_dir: Option<PathBuf>) -> Self {
        let output_dir = output_dir.unwrap_or_else(|| install_dir.join("build"));
        Self {
            parsers_dir: install_dir.join("parsers"),
            objects_dir: install_dir.join("objects"),
            ledger_file: install_dir.join(LEDGER_FILE_NAME),
            output_dir,
            install_dir,
        }
    }

    pub fn clone_dir(&self, language: &str) -> PathBuf {
        self.parsers_dir.join(language)
    }
}

/// `$TS_SETUP_HOME` when set and non-empty, otherwise `~/.tree-sitter`
pub fn default_install_dir() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os(HOME_ENV_VAR).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }

    dirs::home_dir()
        .map(|home| home.join(DEFAULT_DIR_NAME))
        .ok_or_else(|| {
            ConfigError::InstallDirUnavailable {
                message: format!(
                    "cannot determine the home directory; set {HOME_ENV_VAR} or pass --install-dir"
                ),
            }
            .into()
        })
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub install_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub registry_file: Option<PathBuf>,
    pub compiler: Option<ToolchainKind>,
}

/// Fully resolved settings shared by every subcommand
#[derive(Debug, Clone)]
pub struct SetupConfig {
    pub paths: InstallPaths,
    pub registry: LanguageRegistry,
    pub preferred_toolchain: Option<ToolchainKind>,
}

impl SetupConfig {
    pub fn resolve(overrides: ConfigOverrides) -> Result<Self> {
        let install_dir = match overrides.install_dir {
            Some(dir) => dir,
            None => default_install_dir()?,
        };

        let registry = match overrides.registry_file.as_deref() {
            Some(path) => LanguageRegistry::from_yaml_file(path)?,
            None => LanguageRegistry::builtin(),
        };

        let paths = InstallPaths::new(install_dir, overrides.output_dir);
        debug!(
            install_dir = %paths.install_dir.display(),
            output_dir = %paths.output_dir.display(),
            languages = registry.list().len(),
            "Resolved configuration"
        );

        Ok(Self {
            paths,
            registry,
            preferred_toolchain: overrides.compiler,
        })
    }

    /// Configuration rooted at `install_dir` with the built-in registry
    pub fn for_install_dir(install_dir: &Path) -> Self {
        Self {
            paths: InstallPaths::new(install_dir.to_path_buf(), None),
            registry: LanguageRegistry::builtin(),
            preferred_toolchain: None,
        }
    }
}
