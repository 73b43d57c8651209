// Diagnostic logging for ts-setup. User-facing progress goes through user_output;
// these events are for troubleshooting and go to stderr.
use std::io::{self, IsTerminal};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{CliError, Result, SetupError};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub color: ColorConfig,
    /// Whether to show targets (module names)
    pub show_targets: bool,
    pub show_timestamps: bool,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable, multi-line fields
    Pretty,
    /// One JSON object per event
    Json,
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            "compact" => Ok(LogFormat::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Color output configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorConfig {
    Auto,
    Always,
    Never,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::WARN,
            format: LogFormat::Compact,
            color: ColorConfig::Auto,
            show_targets: false,
            show_timestamps: false,
        }
    }
}

impl LogConfig {
    /// Create logging configuration from CLI arguments
    pub fn from_cli(verbose: bool, quiet: bool, color: Option<String>) -> Self {
        let level = if quiet {
            Level::ERROR
        } else if verbose {
            Level::DEBUG
        } else {
            Level::WARN
        };

        let color = match color.as_deref() {
            Some("always") => ColorConfig::Always,
            Some("never") => ColorConfig::Never,
            _ => ColorConfig::Auto,
        };

        Self {
            level,
            color,
            show_targets: verbose,
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Check if colors should be used based on configuration and terminal
    pub fn should_use_colors(&self) -> bool {
        match self.color {
            ColorConfig::Always => true,
            ColorConfig::Never => false,
            ColorConfig::Auto => {
                io::stderr().is_terminal()
                    && std::env::var("TERM").map_or(true, |term| term != "dumb")
                    && std::env::var("NO_COLOR").is_err()
            }
        }
    }

    /// `RUST_LOG` wins when set, otherwise only this crate's events at `level`
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("ts_setup={}", self.level)))
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: LogConfig) -> Result<()> {
    let ansi = config.should_use_colors();
    let builder = fmt()
        .with_env_filter(config.env_filter())
        .with_writer(io::stderr)
        .with_ansi(ansi)
        .with_target(config.show_targets);

    let result = match (config.format, config.show_timestamps) {
        (LogFormat::Pretty, true) => builder.pretty().try_init(),
        (LogFormat::Pretty, false) => builder.pretty().without_time().try_init(),
        (LogFormat::Compact, true) => builder.compact().try_init(),
        (LogFormat::Compact, false) => builder.compact().without_time().try_init(),
        (LogFormat::Json, _) => builder.json().try_init(),
    };

    result.map_err(|e| {
        SetupError::Cli(Box::new(CliError::InvalidArgument {
            argument: "--log-format".to_string(),
            message: format!("cannot initialise logging: {e}"),
            suggestion: None,
        }))
    })
}

/// Spans shared by the install pipeline
pub mod utils {
    use tracing::{span, Level, Span};

    /// Span wrapping one grammar's trip through the pipeline
    pub fn language_span(language: &str) -> Span {
        span!(Level::INFO, "language", id = %language)
    }

    pub fn git_operation_span(operation: &str, repository: Option<&str>) -> Span {
        span!(
            Level::DEBUG,
            "git_operation",
            operation = %operation,
            repository = repository
        )
    }

    pub fn compile_span(language: &str, toolchain: &str) -> Span {
        span!(Level::DEBUG, "compile", language = %language, toolchain = %toolchain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, Level::WARN);
        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.color, ColorConfig::Auto);
        assert!(!config.show_timestamps);
    }

    #[test]
    fn test_log_config_from_cli_verbose() {
        let config = LogConfig::from_cli(true, false, None);
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.show_targets);
    }

    #[test]
    fn test_log_config_from_cli_quiet() {
        let config = LogConfig::from_cli(false, true, None);
        assert_eq!(config.level, Level::ERROR);
    }

    #[test]
    fn test_log_config_color() {
        let config = LogConfig::from_cli(false, false, Some("always".to_string()));
        assert!(config.should_use_colors());

        let config = LogConfig::from_cli(false, false, Some("never".to_string()));
        assert!(!config.should_use_colors());
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
