// Language registry: the ordered table of grammars ts-setup knows how to build

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::error::{ConfigError, Result, SetupError};

/// Build recipe for one Tree-Sitter grammar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSpec {
    pub id: String,
    pub repository: String,
    /// Directory inside the clone that holds the grammar (`src/parser.c` lives below it)
    #[serde(default)]
    pub subpath: Option<String>,
    /// Additional sources relative to the grammar's `src/` directory
    #[serde(default)]
    pub extra_sources: Vec<String>,
    /// Extra include directories relative to the grammar directory
    #[serde(default)]
    pub include_dirs: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub submodules: bool,
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl LanguageSpec {
    pub fn new(id: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            repository: repository.into(),
            subpath: None,
            extra_sources: Vec::new(),
            include_dirs: Vec::new(),
            flags: Vec::new(),
            submodules: false,
            extensions: Vec::new(),
        }
    }

    pub fn with_subpath(mut self, subpath: impl Into<String>) -> Self {
        self.subpath = Some(subpath.into());
        self
    }

    pub fn with_extra_source(mut self, source: impl Into<String>) -> Self {
        self.extra_sources.push(source.into());
        self
    }

    pub fn with_include_dir(mut self, dir: impl Into<String>) -> Self {
        self.include_dirs.push(dir.into());
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    pub fn with_submodules(mut self) -> Self {
        self.submodules = true;
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| normalize_extension(e)).collect();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(invalid(&self.id, "identifier must not be empty"));
        }
        if !self
            .id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(invalid(
                &self.id,
                "identifier may only contain lowercase letters, digits and '_'",
            ));
        }
        if self.repository.trim().is_empty() {
            return Err(invalid(&self.id, "repository URL must not be empty"));
        }
        if self.extensions.iter().any(String::is_empty) {
            return Err(invalid(&self.id, "extensions must not be empty"));
        }
        Ok(())
    }
}

/// `.YML` and `yml` both match `file.yml`
fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn invalid(id: &str, message: &str) -> SetupError {
    SetupError::from(ConfigError::InvalidLanguage {
        id: id.to_string(),
        message: message.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    languages: Vec<LanguageSpec>,
}

/// Immutable, ordered set of language specs
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    specs: Vec<LanguageSpec>,
}

impl LanguageRegistry {
    pub fn new(mut specs: Vec<LanguageSpec>) -> Result<Self> {
        for spec in &mut specs {
            for extension in &mut spec.extensions {
                *extension = normalize_extension(extension);
            }
        }

        let mut seen = HashSet::new();
        for spec in &specs {
            spec.validate()?;
            if !seen.insert(spec.id.as_str()) {
                return Err(ConfigError::DuplicateLanguage {
                    id: spec.id.clone(),
                }
                .into());
            }
        }

        Ok(Self { specs })
    }

    /// The grammars installed by default
    pub fn builtin() -> Self {
        const TREE_SITTER: &str = "https://github.com/tree-sitter";

        let official =
            |id: &str, repo: &str| LanguageSpec::new(id, format!("{TREE_SITTER}/{repo}"));

        let specs = vec![
            official("python", "tree-sitter-python").with_extensions(&["py", "pyi"]),
            official("javascript", "tree-sitter-javascript")
                .with_extensions(&["js", "mjs", "cjs", "jsx"]),
            official("typescript", "tree-sitter-typescript")
                .with_subpath("typescript")
                .with_submodules()
                .with_extensions(&["ts", "mts", "cts"]),
            official("rust", "tree-sitter-rust").with_extensions(&["rs"]),
            official("go", "tree-sitter-go").with_extensions(&["go"]),
            official("cpp", "tree-sitter-cpp")
                .with_extensions(&["cpp", "cc", "cxx", "hpp", "hh"]),
            official("c", "tree-sitter-c").with_extensions(&["c", "h"]),
            official("java", "tree-sitter-java").with_extensions(&["java"]),
            official("ruby", "tree-sitter-ruby").with_extensions(&["rb"]),
            official("php", "tree-sitter-php")
                .with_subpath("php")
                .with_extensions(&["php"]),
            official("c_sharp", "tree-sitter-c-sharp").with_extensions(&["cs"]),
            official("html", "tree-sitter-html").with_extensions(&["html", "htm"]),
            official("css", "tree-sitter-css").with_extensions(&["css"]),
            official("bash", "tree-sitter-bash").with_extensions(&["sh", "bash"]),
            LanguageSpec::new("yaml", "https://github.com/ikatyang/tree-sitter-yaml")
                .with_extra_source("scanner.cc")
                .with_extensions(&["yaml", "yml"]),
            official("json", "tree-sitter-json").with_extensions(&["json"]),
            official("toml", "tree-sitter-toml").with_extensions(&["toml"]),
            official("regex", "tree-sitter-regex"),
            LanguageSpec::new("markdown", "https://github.com/ikatyang/tree-sitter-markdown")
                .with_extra_source("scanner.cc")
                .with_extensions(&["md", "markdown"]),
        ];

        // The table above is static and known to be valid
        Self { specs }
    }

    /// Load a replacement table from a YAML registry file
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
                suggestion: Some(
                    "Pass an existing file to --registry or omit it to use the built-in table"
                        .to_string(),
                ),
            }
            .into());
        }

        let content = std::fs::read_to_string(path)?;
        let file: RegistryFile = serde_yaml::from_str(&content).map_err(|e| {
            let mut error = Box::<ConfigError>::from(e);
            if let ConfigError::InvalidYaml { file_path, .. } = error.as_mut() {
                *file_path = Some(path.to_path_buf());
            }
            SetupError::Config(error)
        })?;

        debug!(path = %path.display(), count = file.languages.len(), "Loaded registry file");
        Self::new(file.languages)
    }

    pub fn list(&self) -> &[LanguageSpec] {
        &self.specs
    }

    pub fn ids(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.id.clone()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&LanguageSpec> {
        self.specs.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Resolve a requested subset, keeping registry order. An empty request selects everything.
    pub fn select(&self, requested: &[String]) -> Result<Vec<&LanguageSpec>> {
        if requested.is_empty() {
            return Ok(self.specs.iter().collect());
        }

        for id in requested {
            if !self.contains(id) {
                return Err(ConfigError::UnknownLanguage {
                    id: id.clone(),
                    available: self.ids(),
                }
                .into());
            }
        }

        Ok(self
            .specs
            .iter()
            .filter(|s| requested.iter().any(|r| r == &s.id))
            .collect())
    }

    /// Map a file to a language by its extension
    pub fn detect_language(&self, path: &Path) -> Option<&LanguageSpec> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.specs
            .iter()
            .find(|s| s.extensions.iter().any(|e| *e == ext))
    }
}
