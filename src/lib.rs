// ts-setup - Library module
// Fetches Tree-Sitter grammar repositories and compiles them into loadable parser libraries

pub mod cli;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod ledger;
pub mod logging;
pub mod orchestrator;
pub mod process;
pub mod registry;
pub mod user_output;

// Re-export main types for easier access
pub use compiler::{
    artifact_file_name, artifact_path, detect_toolchain, CompileJob, CompileResult, Compiler,
    GccLikeToolchain, MsvcToolchain, ParserCompiler, Platform, Toolchain, ToolchainKind,
};
pub use config::{ConfigOverrides, InstallPaths, SetupConfig};
pub use error::{
    exit_codes, CliError, CompileError, ConfigError, FetchError, FetchErrorKind, LedgerError,
    Result, SetupError,
};
pub use fetcher::{FetchOutcome, FetchResult, Fetcher, GitFetcher};
pub use ledger::{InstallLedger, InstallLock, InstallRecord, InstallStatus};
pub use logging::{ColorConfig, LogConfig, LogFormat};
pub use orchestrator::{
    InstallOptions, InstallOrchestrator, InstallSummary, LanguageOutcome, LanguageState,
};
pub use process::{ProcessConfig, ProcessManager, ProcessResult};
pub use registry::{LanguageRegistry, LanguageSpec};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

// Build information (set by build script)
pub const BUILD_DATE: &str = env!("BUILD_DATE");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");
pub const RUST_VERSION: &str = env!("RUST_VERSION");

/// `--version` text with build information; `-V` prints the bare `VERSION`
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit: ",
    env!("GIT_COMMIT"),
    ", built: ",
    env!("BUILD_DATE"),
    ", rustc: ",
    env!("RUST_VERSION"),
    ")"
);
