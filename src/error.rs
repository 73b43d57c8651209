// Error handling framework for ts-setup
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SetupError>;

/// Main error type for ts-setup
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<ConfigError>),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] Box<FetchError>),

    #[error("Compilation failed: {0}")]
    Compile(#[from] Box<CompileError>),

    #[error("No C compiler found (searched: {})", .searched.join(", "))]
    NoCompilerFound { searched: Vec<String> },

    #[error("Ledger operation failed: {0}")]
    Ledger(#[from] Box<LedgerError>),

    #[error("CLI argument error: {0}")]
    Cli(#[from] Box<CliError>),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Registry and configuration errors. All of these abort the run before any work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Duplicate language identifier: {id}")]
    DuplicateLanguage { id: String },

    #[error("Unknown language: {id}")]
    UnknownLanguage { id: String, available: Vec<String> },

    #[error("Invalid language definition '{id}': {message}")]
    InvalidLanguage { id: String, message: String },

    #[error("Invalid YAML syntax: {message}")]
    InvalidYaml {
        message: String,
        line: Option<u32>,
        column: Option<u32>,
        file_path: Option<PathBuf>,
    },

    #[error("Registry file not found: {path}")]
    NotFound {
        path: PathBuf,
        suggestion: Option<String>,
    },

    #[error("Cannot determine install directory: {message}")]
    InstallDirUnavailable { message: String },
}

/// Classification of a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    NetworkFailure,
    CorruptClone,
    AuthFailure,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::NetworkFailure => write!(f, "NetworkFailure"),
            FetchErrorKind::CorruptClone => write!(f, "CorruptClone"),
            FetchErrorKind::AuthFailure => write!(f, "AuthFailure"),
        }
    }
}

/// Repository acquisition failure for one language
#[derive(Debug, Error)]
#[error("{kind} while fetching {language} from {url}: {message}")]
pub struct FetchError {
    pub language: String,
    pub url: String,
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(
        language: impl Into<String>,
        url: impl Into<String>,
        kind: FetchErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            language: language.into(),
            url: url.into(),
            kind,
            message: message.into(),
        }
    }

    /// Classify a libgit2 error raised during clone or fetch
    pub fn from_git(language: &str, url: &str, error: &git2::Error) -> Self {
        let kind = match (error.code(), error.class()) {
            (git2::ErrorCode::Auth, _) | (git2::ErrorCode::Certificate, _) => {
                FetchErrorKind::AuthFailure
            }
            (
                _,
                git2::ErrorClass::Odb
                | git2::ErrorClass::Object
                | git2::ErrorClass::Index
                | git2::ErrorClass::Checkout,
            ) => FetchErrorKind::CorruptClone,
            _ => FetchErrorKind::NetworkFailure,
        };

        Self::new(language, url, kind, error.message())
    }
}

/// Parser compilation failures for one language
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("Parser source not found for {language}: {path}")]
    MissingParserSource { language: String, path: PathBuf },

    #[error("{command} exited with code {} while building {language}", .exit_code.map_or_else(|| "?".to_string(), |c| c.to_string()))]
    NonZeroExit {
        language: String,
        command: String,
        exit_code: Option<i32>,
        stderr_excerpt: String,
    },

    #[error("Failed to spawn {command} for {language}: {error}")]
    SpawnFailed {
        language: String,
        command: String,
        error: String,
    },

    #[error("{tool} is required to build {language} but was not found")]
    ToolUnavailable { language: String, tool: String },
}

/// Ledger persistence and locking errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Failed to write ledger {path}: {error}")]
    WriteFailed { path: PathBuf, error: String },

    #[error("Failed to serialize ledger: {error}")]
    SerializeFailed { error: String },

    #[error("Another ts-setup run holds the lock: {path}")]
    Locked { path: PathBuf },

    #[error("Directory creation failed: {path}")]
    DirectoryFailed { path: PathBuf, error: String },
}

/// CLI argument errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Conflicting arguments: {first} and {second}")]
    ConflictingArguments {
        first: String,
        second: String,
        suggestion: String,
    },

    #[error("Invalid argument: {argument}")]
    InvalidArgument {
        argument: String,
        message: String,
        suggestion: Option<String>,
    },
}

/// Format errors with colors and context
pub struct ErrorFormatter {
    use_colors: bool,
}

impl ErrorFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    /// Format an error with context and colors
    pub fn format_error(&self, error: &SetupError) -> String {
        let mut output = String::new();

        if self.use_colors {
            output.push_str("\x1b[31m");
        }
        output.push_str("Error: ");
        if self.use_colors {
            output.push_str("\x1b[0m");
        }

        output.push_str(&error.to_string());

        match error {
            SetupError::Config(config_err) => {
                self.add_config_context(&mut output, config_err.as_ref());
            }
            SetupError::Compile(compile_err) => {
                self.add_compile_context(&mut output, compile_err.as_ref());
            }
            SetupError::NoCompilerFound { .. } => {
                output.push_str(
                    "\n  Help: Install gcc or clang (Unix) or Visual Studio Build Tools (Windows) and make sure it is on PATH",
                );
            }
            SetupError::Ledger(ledger_err) => {
                if let LedgerError::Locked { .. } = ledger_err.as_ref() {
                    output.push_str("\n  Help: Wait for the other run to finish and try again");
                }
            }
            SetupError::Cli(cli_err) => match cli_err.as_ref() {
                CliError::ConflictingArguments { suggestion, .. } => {
                    output.push_str(&format!("\n  Help: {suggestion}"));
                }
                CliError::InvalidArgument {
                    message,
                    suggestion,
                    ..
                } => {
                    output.push_str(&format!("\n  {message}"));
                    if let Some(suggestion) = suggestion {
                        output.push_str(&format!("\n  Help: {suggestion}"));
                    }
                }
            },
            _ => {}
        }

        output
    }

    fn add_config_context(&self, output: &mut String, error: &ConfigError) {
        match error {
            ConfigError::UnknownLanguage { available, .. } => {
                output.push_str(&format!("\n  Available: {}", available.join(", ")));
            }
            ConfigError::InvalidYaml {
                file_path: Some(path),
                line: Some(line),
                ..
            } => {
                output.push_str(&format!("\n  --> {}:{}", path.display(), line));
            }
            ConfigError::NotFound {
                suggestion: Some(suggestion),
                ..
            } => {
                output.push_str(&format!("\n  Help: {suggestion}"));
            }
            _ => {}
        }
    }

    fn add_compile_context(&self, output: &mut String, error: &CompileError) {
        if let CompileError::NonZeroExit { stderr_excerpt, .. } = error {
            if !stderr_excerpt.is_empty() {
                output.push_str(&format!("\n  Compiler output: {stderr_excerpt}"));
            }
        }
    }
}

/// Process exit codes
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const INSTALL_FAILURE: i32 = 1;
    pub const CONFIG_ERROR: i32 = 2;
}

impl SetupError {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SetupError::Config(_) | SetupError::Cli(_) => exit_codes::CONFIG_ERROR,
            _ => exit_codes::INSTALL_FAILURE,
        }
    }

    /// Create a user-friendly error message with context
    pub fn user_message(&self, use_colors: bool) -> String {
        ErrorFormatter::new(use_colors).format_error(self)
    }
}

impl From<ConfigError> for SetupError {
    fn from(error: ConfigError) -> Self {
        SetupError::Config(Box::new(error))
    }
}

impl From<FetchError> for SetupError {
    fn from(error: FetchError) -> Self {
        SetupError::Fetch(Box::new(error))
    }
}

impl From<CompileError> for SetupError {
    fn from(error: CompileError) -> Self {
        SetupError::Compile(Box::new(error))
    }
}

impl From<LedgerError> for SetupError {
    fn from(error: LedgerError) -> Self {
        SetupError::Ledger(Box::new(error))
    }
}

// Conversion from serde_yaml::Error to ConfigError
impl From<serde_yaml::Error> for Box<ConfigError> {
    fn from(error: serde_yaml::Error) -> Self {
        let location = error.location();
        Box::new(ConfigError::InvalidYaml {
            message: error.to_string(),
            line: location.as_ref().map(|l| l.line() as u32),
            column: location.as_ref().map(|l| l.column() as u32),
            file_path: None,
        })
    }
}
