// Process execution for external toolchain invocations: argument building,
// output capture and stderr excerpts for failure reports

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::debug;

/// Lines of compiler stderr kept in a failure record
pub const STDERR_EXCERPT_LINES: usize = 20;
/// Upper bound on the excerpt size in bytes
pub const STDERR_EXCERPT_BYTES: usize = 2048;

/// Process execution configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessConfig {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ProcessConfig {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Short program name used in error messages (`gcc`, `cl`, ...)
    pub fn program_name(&self) -> String {
        self.program
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Whether any argument equals `needle`
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }

    /// Shell-like rendering for logs
    pub fn command_line(&self) -> String {
        let mut line = self.program.to_string_lossy().to_string();
        for arg in &self.args {
            line.push(' ');
            let arg = arg.to_string_lossy();
            if arg.contains(' ') {
                line.push_str(&format!("\"{arg}\""));
            } else {
                line.push_str(&arg);
            }
        }
        line
    }
}

/// Process execution result
#[derive(Debug)]
pub struct ProcessResult {
    pub exit_status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub duration: Duration,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.exit_status.success()
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.code()
    }

    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Tail of the diagnostic output. MSVC reports errors on stdout, so fall back to it.
    pub fn stderr_excerpt(&self) -> String {
        if self.stderr.iter().all(u8::is_ascii_whitespace) {
            excerpt(&self.stdout())
        } else {
            excerpt(&self.stderr())
        }
    }
}

/// Keep the last lines of `output`, bounded by line count and byte size
pub fn excerpt(output: &str) -> String {
    let lines: Vec<&str> = output.trim_end().lines().collect();
    let start = lines.len().saturating_sub(STDERR_EXCERPT_LINES);
    let mut tail = lines[start..].join("\n");

    if tail.len() > STDERR_EXCERPT_BYTES {
        let mut cut = tail.len() - STDERR_EXCERPT_BYTES;
        while !tail.is_char_boundary(cut) {
            cut += 1;
        }
        tail = tail[cut..].to_string();
    }

    tail
}

/// Blocking process runner. Each invocation is waited on before returning.
#[derive(Debug, Default, Clone)]
pub struct ProcessManager;

impl ProcessManager {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self, config: &ProcessConfig) -> io::Result<ProcessResult> {
        let start_time = Instant::now();
        debug!(command = %config.command_line(), "Executing process");

        let output = Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()?;

        let result = ProcessResult {
            exit_status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
            duration: start_time.elapsed(),
        };

        debug!(
            program = %config.program_name(),
            exit_code = ?result.exit_code(),
            duration_ms = result.duration.as_millis() as u64,
            "Process finished"
        );

        Ok(result)
    }
}
