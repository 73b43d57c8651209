// User-facing output: per-language progress lines, the run summary and the info table.
// Diagnostics go through tracing; this module only writes what the user asked to see.

use std::io::{self, IsTerminal, Write};

use crate::error::{CompileError, SetupError};
use crate::ledger::InstallStatus;
use crate::orchestrator::{InstallSummary, LanguageState};

/// Width of the dotted language column
const NAME_WIDTH: usize = 40;

/// Simple output configuration for user-facing display
#[derive(Debug, Clone)]
pub struct UserOutputConfig {
    pub verbose: bool,
    pub quiet: bool,
    pub use_colors: bool,
}

impl UserOutputConfig {
    pub fn new(verbose: bool, quiet: bool, color: Option<String>) -> Self {
        let use_colors = match color.as_deref() {
            Some("always") => true,
            Some("never") => false,
            Some("auto") | None => {
                io::stdout().is_terminal()
                    && std::env::var("TERM").map_or(true, |term| term != "dumb")
                    && std::env::var("NO_COLOR").is_err()
            }
            _ => false,
        };

        Self {
            verbose,
            quiet,
            use_colors,
        }
    }
}

/// Simple color constants
#[derive(Clone, Debug)]
pub struct Colors {
    pub green: &'static str,
    pub red: &'static str,
    pub yellow: &'static str,
    pub blue: &'static str,
    pub reset: &'static str,
}

impl Colors {
    pub fn new(use_colors: bool) -> Self {
        if use_colors {
            Self {
                green: "\x1b[32m",
                red: "\x1b[31m",
                yellow: "\x1b[33m",
                blue: "\x1b[34m",
                reset: "\x1b[0m",
            }
        } else {
            Self {
                green: "",
                red: "",
                yellow: "",
                blue: "",
                reset: "",
            }
        }
    }
}

/// One row of the `info` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageStatusRow {
    pub language: String,
    pub source_present: bool,
    pub binary_present: bool,
    pub recorded: Option<InstallStatus>,
}

#[derive(Clone, Debug)]
pub struct UserOutput {
    config: UserOutputConfig,
    colors: Colors,
}

impl UserOutput {
    pub fn new(config: UserOutputConfig) -> Self {
        let colors = Colors::new(config.use_colors);
        Self { config, colors }
    }

    /// Progress callback target: prints `Name........Installed` style lines
    pub fn show_state(&self, language: &str, state: LanguageState) {
        if self.config.quiet {
            return;
        }

        match state {
            LanguageState::Pending => {
                print!("{}", self.format_language_name(language));
                io::stdout().flush().unwrap_or(());
            }
            LanguageState::Fetching | LanguageState::Compiling => {
                if self.config.verbose {
                    print!("{}{state}{} ", self.colors.blue, self.colors.reset);
                    io::stdout().flush().unwrap_or(());
                }
            }
            LanguageState::Skipped => {
                println!("{}Skipped{}", self.colors.yellow, self.colors.reset);
            }
            LanguageState::Recorded(InstallStatus::Success) => {
                println!("{}Installed{}", self.colors.green, self.colors.reset);
            }
            LanguageState::Recorded(InstallStatus::Failed) => {
                println!("{}Failed{}", self.colors.red, self.colors.reset);
            }
        }
    }

    /// Show the final counts and every failure with its reason
    pub fn show_summary(&self, summary: &InstallSummary) {
        if self.config.quiet && summary.failed() == 0 {
            return;
        }
        println!();
        print!("{}", self.format_summary(summary));
    }

    pub fn format_summary(&self, summary: &InstallSummary) -> String {
        let mut output = String::new();

        let color = if summary.failed() == 0 {
            self.colors.green
        } else {
            self.colors.red
        };
        output.push_str(&format!(
            "{color}{} installed, {} skipped, {} failed{} ({:.1}s)\n",
            summary.succeeded(),
            summary.skipped(),
            summary.failed(),
            self.colors.reset,
            summary.duration.as_secs_f64()
        ));

        let failures = summary.failures();
        if failures.is_empty() {
            return output;
        }

        output.push_str("\nFailed languages:\n");
        for (language, error) in failures {
            output.push_str(&format!(
                "  {}{language}{}: {error}\n",
                self.colors.red, self.colors.reset
            ));

            if let SetupError::Compile(compile) = error {
                if let CompileError::NonZeroExit { stderr_excerpt, .. } = compile.as_ref() {
                    for line in stderr_excerpt.lines() {
                        output.push_str(&format!("      {line}\n"));
                    }
                }
            }
        }

        output
    }

    pub fn show_info_header(&self, label: &str, value: &str) {
        println!("{}{label:<14}{} {value}", self.colors.blue, self.colors.reset);
    }

    pub fn show_info_rows(&self, rows: &[LanguageStatusRow]) {
        println!();
        println!("{:<16} {:<8} {:<8} Ledger", "Language", "Source", "Binary");
        for row in rows {
            println!("{}", self.format_info_row(row));
        }
    }

    pub fn format_info_row(&self, row: &LanguageStatusRow) -> String {
        let mark = |present: bool| {
            if present {
                format!("{}✓{}", self.colors.green, self.colors.reset)
            } else {
                format!("{}✗{}", self.colors.red, self.colors.reset)
            }
        };
        let recorded = match row.recorded {
            Some(InstallStatus::Success) => "success",
            Some(InstallStatus::Failed) => "failed",
            None => "-",
        };

        // Pad the marks by hand, color codes would skew the width
        format!(
            "{:<16} {}        {}        {recorded}",
            row.language,
            mark(row.source_present),
            mark(row.binary_present)
        )
    }

    /// Dotted name column, e.g. `C Sharp.............`
    fn format_language_name(&self, language: &str) -> String {
        let name: String = language
            .replace('_', " ")
            .split_whitespace()
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    None => String::new(),
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        if name.len() >= NAME_WIDTH {
            name
        } else {
            let dots_count = NAME_WIDTH - name.len();
            format!("{}{}", name, ".".repeat(dots_count))
        }
    }

    pub fn show_status(&self, message: &str) {
        if !self.config.quiet {
            println!("{message}");
        }
    }

    pub fn show_warning(&self, message: &str) {
        if !self.config.quiet {
            eprintln!(
                "{}Warning: {}{}",
                self.colors.yellow, message, self.colors.reset
            );
        }
    }
}
