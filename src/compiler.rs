// Parser compilation: turns a grammar's generated C/C++ sources into one shared library
//
// The toolchain is a strategy chosen once per run. `Toolchain::commands` only plans
// the invocations, `ParserCompiler` runs them and converts failures into `CompileError`.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{CompileError, Result, SetupError};
use crate::logging::utils::compile_span;
use crate::process::{ProcessConfig, ProcessManager};
use crate::registry::LanguageSpec;

/// Target platform family, which decides the artifact extension and toolchain order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    pub fn shared_library_extension(self) -> &'static str {
        match self {
            Platform::Unix => "so",
            Platform::Windows => "dll",
        }
    }

    pub fn object_extension(self) -> &'static str {
        match self {
            Platform::Unix => "o",
            Platform::Windows => "obj",
        }
    }
}

/// `<language>.<so|dll>`
pub fn artifact_file_name(language: &str, platform: Platform) -> String {
    format!("{language}.{}", platform.shared_library_extension())
}

pub fn artifact_path(output_dir: &Path, language: &str, platform: Platform) -> PathBuf {
    output_dir.join(artifact_file_name(language, platform))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolchainKind {
    Gcc,
    Clang,
    Msvc,
}

impl fmt::Display for ToolchainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolchainKind::Gcc => write!(f, "gcc"),
            ToolchainKind::Clang => write!(f, "clang"),
            ToolchainKind::Msvc => write!(f, "msvc"),
        }
    }
}

impl FromStr for ToolchainKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gcc" => Ok(ToolchainKind::Gcc),
            "clang" => Ok(ToolchainKind::Clang),
            "msvc" | "cl" => Ok(ToolchainKind::Msvc),
            other => Err(format!("unknown compiler '{other}'")),
        }
    }
}

/// Everything a toolchain needs to plan the build of one grammar
#[derive(Debug, Clone)]
pub struct CompileJob {
    pub language: String,
    pub sources: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub flags: Vec<String>,
    pub object_dir: PathBuf,
    pub output: PathBuf,
}

impl CompileJob {
    pub fn has_cpp_sources(&self) -> bool {
        self.sources.iter().any(|s| is_cpp_source(s))
    }
}

pub fn is_cpp_source(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("cc" | "cpp" | "cxx")
    )
}

/// A native compiler family able to produce a shared library
pub trait Toolchain: fmt::Debug {
    fn kind(&self) -> ToolchainKind;

    /// The processes to run, in order, to build `job.output`
    fn commands(&self, job: &CompileJob) -> std::result::Result<Vec<ProcessConfig>, CompileError>;
}

/// GCC and Clang share a command-line dialect
#[derive(Debug, Clone)]
pub struct GccLikeToolchain {
    kind: ToolchainKind,
    cc: PathBuf,
    cxx: Option<PathBuf>,
    platform: Platform,
}

impl GccLikeToolchain {
    pub fn new(kind: ToolchainKind, cc: PathBuf, cxx: Option<PathBuf>, platform: Platform) -> Self {
        Self {
            kind,
            cc,
            cxx,
            platform,
        }
    }

    fn cxx(&self, language: &str) -> std::result::Result<&Path, CompileError> {
        self.cxx
            .as_deref()
            .ok_or_else(|| CompileError::ToolUnavailable {
                language: language.to_string(),
                tool: format!("C++ compiler for {}", self.kind),
            })
    }
}

impl Toolchain for GccLikeToolchain {
    fn kind(&self) -> ToolchainKind {
        self.kind
    }

    fn commands(&self, job: &CompileJob) -> std::result::Result<Vec<ProcessConfig>, CompileError> {
        let mut commands = Vec::with_capacity(job.sources.len() + 1);
        let mut objects = Vec::with_capacity(job.sources.len());

        for source in &job.sources {
            let cpp = is_cpp_source(source);
            let driver = if cpp {
                self.cxx(&job.language)?
            } else {
                self.cc.as_path()
            };

            let object = object_path(&job.object_dir, source, self.platform);

            let mut cmd = ProcessConfig::new(driver);
            if self.platform == Platform::Unix {
                cmd = cmd.arg("-fPIC");
            }
            cmd = cmd
                .arg("-O2")
                .arg(if cpp { "-std=c++14" } else { "-std=gnu11" })
                .arg("-w");
            for dir in &job.include_dirs {
                cmd = cmd.arg("-I").arg(dir);
            }
            cmd = cmd
                .with_args(&job.flags)
                .arg("-c")
                .arg(source)
                .arg("-o")
                .arg(&object);

            commands.push(cmd);
            objects.push(object);
        }

        let linker = if job.has_cpp_sources() {
            self.cxx(&job.language)?
        } else {
            self.cc.as_path()
        };
        let link = ProcessConfig::new(linker)
            .arg("-shared")
            .arg("-O2")
            .with_args(&objects)
            .arg("-o")
            .arg(&job.output);
        commands.push(link);

        Ok(commands)
    }
}

/// Microsoft Visual C++ (`cl.exe`), compiling and linking in one invocation
#[derive(Debug, Clone)]
pub struct MsvcToolchain {
    cl: PathBuf,
}

impl MsvcToolchain {
    pub fn new(cl: PathBuf) -> Self {
        Self { cl }
    }
}

impl Toolchain for MsvcToolchain {
    fn kind(&self) -> ToolchainKind {
        ToolchainKind::Msvc
    }

    fn commands(&self, job: &CompileJob) -> std::result::Result<Vec<ProcessConfig>, CompileError> {
        let mut cmd = ProcessConfig::new(&self.cl).with_args([
            "/nologo",
            "/O2",
            "/MT",
            "/LD",
            "/utf-8",
            "/DNDEBUG",
            "/D_CRT_SECURE_NO_WARNINGS",
        ]);
        for dir in &job.include_dirs {
            cmd = cmd.arg("/I").arg(dir);
        }
        cmd = cmd.with_args(&job.flags);

        for source in &job.sources {
            if is_cpp_source(source) {
                let mut arg = OsString::from("/Tp");
                arg.push(source);
                cmd = cmd.arg(arg);
            } else {
                cmd = cmd.arg(source);
            }
        }

        let mut object_dir = OsString::from("/Fo");
        object_dir.push(&job.object_dir);
        object_dir.push("\\");
        let mut output = OsString::from("/Fe");
        output.push(&job.output);

        Ok(vec![cmd.arg(object_dir).arg(output)])
    }
}

fn object_path(object_dir: &Path, source: &Path, platform: Platform) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "source".to_string());
    object_dir.join(format!("{name}.{}", platform.object_extension()))
}

struct Candidate {
    kind: ToolchainKind,
    cc: &'static str,
    cxx: Option<&'static str>,
}

fn candidates(platform: Platform) -> Vec<Candidate> {
    let gcc = Candidate {
        kind: ToolchainKind::Gcc,
        cc: "gcc",
        cxx: Some("g++"),
    };
    let clang = Candidate {
        kind: ToolchainKind::Clang,
        cc: "clang",
        cxx: Some("clang++"),
    };

    match platform {
        Platform::Unix => vec![
            gcc,
            clang,
            // system driver, usually a gcc or clang alias
            Candidate {
                kind: ToolchainKind::Gcc,
                cc: "cc",
                cxx: Some("c++"),
            },
        ],
        Platform::Windows => vec![
            Candidate {
                kind: ToolchainKind::Msvc,
                cc: "cl",
                cxx: None,
            },
            clang,
            gcc,
        ],
    }
}

/// Pick the first available toolchain in platform preference order.
/// `lookup` resolves an executable name to a path (normally `which`).
pub fn detect_toolchain<F>(
    platform: Platform,
    preferred: Option<ToolchainKind>,
    lookup: F,
) -> Result<Box<dyn Toolchain>>
where
    F: Fn(&str) -> Option<PathBuf>,
{
    let candidates: Vec<Candidate> = candidates(platform)
        .into_iter()
        .filter(|c| preferred.map_or(true, |p| p == c.kind))
        .collect();

    for candidate in &candidates {
        let Some(cc) = lookup(candidate.cc) else {
            continue;
        };

        debug!(compiler = %cc.display(), kind = %candidate.kind, "Selected toolchain");
        let toolchain: Box<dyn Toolchain> = match candidate.kind {
            ToolchainKind::Msvc => Box::new(MsvcToolchain::new(cc)),
            kind => {
                let cxx = candidate.cxx.and_then(&lookup);
                Box::new(GccLikeToolchain::new(kind, cc, cxx, platform))
            }
        };
        return Ok(toolchain);
    }

    let mut searched: Vec<String> = candidates.iter().map(|c| c.cc.to_string()).collect();
    if searched.is_empty() {
        if let Some(kind) = preferred {
            searched.push(format!("{kind} (unsupported on this platform)"));
        }
    }
    Err(SetupError::NoCompilerFound { searched })
}

/// Collect the sources of a grammar: `src/parser.c`, declared extras, and a conventional scanner
pub fn grammar_sources(source_root: &Path, spec: &LanguageSpec) -> Result<Vec<PathBuf>> {
    let src = source_root.join("src");
    let parser = src.join("parser.c");
    if !parser.is_file() {
        return Err(CompileError::MissingParserSource {
            language: spec.id.clone(),
            path: parser,
        }
        .into());
    }

    let mut sources = vec![parser];

    for extra in &spec.extra_sources {
        let path = src.join(extra);
        if path.is_file() {
            if !sources.contains(&path) {
                sources.push(path);
            }
        } else {
            warn!(
                language = %spec.id,
                source = %path.display(),
                "Declared source not found, building without it"
            );
        }
    }

    let has_scanner = sources
        .iter()
        .any(|s| s.file_stem().is_some_and(|stem| stem == "scanner"));
    if !has_scanner {
        if let Some(scanner) = ["scanner.c", "scanner.cc"]
            .iter()
            .map(|name| src.join(name))
            .find(|path| path.is_file())
        {
            sources.push(scanner);
        }
    }

    Ok(sources)
}

#[derive(Debug, Clone)]
pub struct CompileResult {
    pub artifact: PathBuf,
    pub toolchain: ToolchainKind,
    pub sources: Vec<PathBuf>,
    pub duration: Duration,
}

/// Builds a grammar into a loadable parser library
pub trait Compiler {
    fn compile(
        &self,
        source_root: &Path,
        spec: &LanguageSpec,
        output_dir: &Path,
    ) -> Result<CompileResult>;
}

/// Compiler backed by a native toolchain on the search path
#[derive(Debug)]
pub struct ParserCompiler {
    toolchain: Option<Box<dyn Toolchain>>,
    searched: Vec<String>,
    platform: Platform,
    objects_dir: PathBuf,
    process: ProcessManager,
}

impl ParserCompiler {
    /// Probe the search path once. A missing toolchain is reported on the first compile.
    pub fn detect(platform: Platform, preferred: Option<ToolchainKind>, objects_dir: PathBuf) -> Self {
        match detect_toolchain(platform, preferred, |name| which::which(name).ok()) {
            Ok(toolchain) => Self::with_toolchain(toolchain, platform, objects_dir),
            Err(e) => {
                let searched = match e {
                    SetupError::NoCompilerFound { searched } => searched,
                    _ => Vec::new(),
                };
                debug!(?searched, "No toolchain detected");
                Self {
                    toolchain: None,
                    searched,
                    platform,
                    objects_dir,
                    process: ProcessManager::new(),
                }
            }
        }
    }

    pub fn with_toolchain(
        toolchain: Box<dyn Toolchain>,
        platform: Platform,
        objects_dir: PathBuf,
    ) -> Self {
        Self {
            toolchain: Some(toolchain),
            searched: Vec::new(),
            platform,
            objects_dir,
            process: ProcessManager::new(),
        }
    }

    pub fn toolchain(&self) -> Option<&dyn Toolchain> {
        self.toolchain.as_deref()
    }

    /// Plan the build of one grammar without running anything
    pub fn job(&self, source_root: &Path, spec: &LanguageSpec, output_dir: &Path) -> Result<CompileJob> {
        let sources = grammar_sources(source_root, spec)?;

        let mut include_dirs = vec![source_root.join("src"), source_root.to_path_buf()];
        include_dirs.extend(spec.include_dirs.iter().map(|d| source_root.join(d)));

        Ok(CompileJob {
            language: spec.id.clone(),
            sources,
            include_dirs,
            flags: spec.flags.clone(),
            object_dir: self.objects_dir.join(&spec.id),
            output: artifact_path(output_dir, &spec.id, self.platform),
        })
    }

    fn run(&self, language: &str, command: &ProcessConfig) -> Result<()> {
        let result = self.process.execute(command).map_err(|e| CompileError::SpawnFailed {
            language: language.to_string(),
            command: command.program_name(),
            error: e.to_string(),
        })?;

        if !result.success() {
            return Err(CompileError::NonZeroExit {
                language: language.to_string(),
                command: command.program_name(),
                exit_code: result.exit_code(),
                stderr_excerpt: result.stderr_excerpt(),
            }
            .into());
        }

        Ok(())
    }
}

impl Compiler for ParserCompiler {
    fn compile(
        &self,
        source_root: &Path,
        spec: &LanguageSpec,
        output_dir: &Path,
    ) -> Result<CompileResult> {
        let Some(toolchain) = self.toolchain.as_deref() else {
            return Err(SetupError::NoCompilerFound {
                searched: self.searched.clone(),
            });
        };

        let _span = compile_span(&spec.id, &toolchain.kind().to_string()).entered();
        let start = Instant::now();
        let job = self.job(source_root, spec, output_dir)?;
        let commands = toolchain.commands(&job)?;

        fs::create_dir_all(&job.object_dir)?;
        fs::create_dir_all(output_dir)?;

        for command in &commands {
            self.run(&spec.id, command)?;
        }

        if let Err(e) = fs::remove_dir_all(&job.object_dir) {
            debug!(path = %job.object_dir.display(), error = %e, "Could not remove intermediates");
        }

        info!(
            language = %spec.id,
            artifact = %job.output.display(),
            toolchain = %toolchain.kind(),
            "Parser compiled"
        );

        Ok(CompileResult {
            artifact: job.output,
            toolchain: toolchain.kind(),
            sources: job.sources,
            duration: start.elapsed(),
        })
    }
}
