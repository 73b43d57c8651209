// CLI interface for ts-setup using clap
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

use crate::commands::clean::{execute_clean_command, CleanConfig};
use crate::commands::detect::execute_detect_command;
use crate::commands::info::execute_info_command;
use crate::commands::install::{execute_install_command, InstallConfig};
use crate::compiler::ToolchainKind;
use crate::config::{ConfigOverrides, SetupConfig};
use crate::error::{exit_codes, CliError, Result, SetupError};
use crate::logging::{LogConfig, LogFormat};
use crate::user_output::{UserOutput, UserOutputConfig};

#[derive(Parser)]
#[command(
    name = "ts-setup",
    about = "ts-setup - Fetch Tree-Sitter grammars and compile them into loadable parsers",
    version = crate::VERSION,
    long_version = crate::LONG_VERSION,
    long_about = "ts-setup clones the repositories of the registered Tree-Sitter grammars, \
compiles each one with the system C toolchain into a shared library and records \
the outcome so later runs only redo what failed."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Install options used when no subcommand is given
    #[command(flatten)]
    pub install: InstallArgs,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Control color output (auto, always, never)
    #[arg(long, global = true, value_name = "WHEN")]
    pub color: Option<String>,

    /// Diagnostic log format (pretty, compact, json)
    #[arg(long, global = true, value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Root directory for clones, intermediates and the ledger [default: $TS_SETUP_HOME or ~/.tree-sitter]
    #[arg(long, global = true, value_name = "DIR")]
    pub install_dir: Option<PathBuf>,

    /// YAML file replacing the built-in language table
    #[arg(long, global = true, value_name = "FILE")]
    pub registry: Option<PathBuf>,

    /// Force a toolchain family (gcc, clang, msvc)
    #[arg(long, global = true, value_name = "NAME")]
    pub compiler: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct InstallArgs {
    /// Comma-separated language identifiers (default: all)
    #[arg(long, value_delimiter = ',', value_name = "LANGS")]
    pub languages: Vec<String>,

    /// Rebuild languages that are already installed
    #[arg(long)]
    pub force: bool,

    /// Directory receiving the compiled parsers
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch and compile grammars (default command)
    Install(InstallArgs),

    /// Show directories, toolchain and per-language install state
    Info,

    /// Report the language and parser for a file
    Detect {
        /// File to classify by extension
        file: PathBuf,
    },

    /// Remove built parsers, intermediates and the ledger
    Clean {
        /// Also remove the cloned grammar repositories
        #[arg(long)]
        sources: bool,
    },

    /// Generate shell completion scripts
    GenerateCompletion {
        /// Shell to generate completion for
        shell: Shell,
    },
}

impl Cli {
    pub fn run(&self) -> Result<i32> {
        if self.verbose && self.quiet {
            return Err(SetupError::Cli(Box::new(CliError::ConflictingArguments {
                first: "--verbose".to_string(),
                second: "--quiet".to_string(),
                suggestion: "Use either --verbose for more output or --quiet for less output, but not both".to_string(),
            })));
        }

        let log_format = self.log_format()?;
        let compiler = self.compiler()?;
        self.init_logging(log_format);

        let output = UserOutput::new(UserOutputConfig::new(
            self.verbose,
            self.quiet,
            self.color.clone(),
        ));

        if let Some(Commands::GenerateCompletion { shell }) = &self.command {
            let mut cmd = Self::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut std::io::stdout());
            return Ok(exit_codes::SUCCESS);
        }

        let install_args = match &self.command {
            Some(Commands::Install(args)) => args,
            _ => &self.install,
        };

        let config = SetupConfig::resolve(ConfigOverrides {
            install_dir: self.install_dir.clone(),
            output_dir: install_args.output_dir.clone(),
            registry_file: self.registry.clone(),
            compiler,
        })?;

        match &self.command {
            None | Some(Commands::Install(_)) => {
                let install = InstallConfig {
                    languages: install_args.languages.clone(),
                    force: install_args.force,
                };
                let summary = execute_install_command(&config, &install, &output)?;
                Ok(summary.exit_code())
            }
            Some(Commands::Info) => {
                execute_info_command(&config, &output)?;
                Ok(exit_codes::SUCCESS)
            }
            Some(Commands::Detect { file }) => execute_detect_command(&config, file, &output),
            Some(Commands::Clean { sources }) => {
                let result = execute_clean_command(&config, &CleanConfig { sources: *sources })?;
                output.show_status(&format!("Removed {} path(s)", result.removed.len()));
                Ok(exit_codes::SUCCESS)
            }
            Some(Commands::GenerateCompletion { .. }) => Ok(exit_codes::SUCCESS),
        }
    }

    /// Whether error messages printed by `main` should be colored
    pub fn use_colors(&self) -> bool {
        LogConfig::from_cli(self.verbose, self.quiet, self.color.clone()).should_use_colors()
    }

    fn log_format(&self) -> Result<LogFormat> {
        match self.log_format.as_deref() {
            None => Ok(LogFormat::Compact),
            Some(value) => value.parse().map_err(|message| {
                SetupError::Cli(Box::new(CliError::InvalidArgument {
                    argument: "--log-format".to_string(),
                    message,
                    suggestion: Some("Use one of: pretty, compact, json".to_string()),
                }))
            }),
        }
    }

    fn compiler(&self) -> Result<Option<ToolchainKind>> {
        self.compiler
            .as_deref()
            .map(|value| {
                value.parse::<ToolchainKind>().map_err(|message| {
                    SetupError::Cli(Box::new(CliError::InvalidArgument {
                        argument: "--compiler".to_string(),
                        message,
                        suggestion: Some("Use one of: gcc, clang, msvc".to_string()),
                    }))
                })
            })
            .transpose()
    }

    fn init_logging(&self, format: LogFormat) {
        use crate::logging::init_logging;

        let log_config =
            LogConfig::from_cli(self.verbose, self.quiet, self.color.clone()).with_format(format);

        if let Err(e) = init_logging(log_config) {
            eprintln!("Failed to initialize logging: {e}");
        }
    }
}
