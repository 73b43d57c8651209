// Install ledger: persisted per-language outcomes, written through on every record

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{LedgerError, Result};

/// File name of the ledger inside the install directory
pub const LEDGER_FILE_NAME: &str = ".installed";
/// File name of the run lock inside the install directory
pub const LOCK_FILE_NAME: &str = ".lock";

const LEDGER_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    Success,
    Failed,
}

/// Outcome of the most recent install attempt for one language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRecord {
    pub language: String,
    pub status: InstallStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InstallRecord {
    pub fn success(language: impl Into<String>, artifact_path: PathBuf) -> Self {
        Self {
            language: language.into(),
            status: InstallStatus::Success,
            timestamp: Utc::now(),
            artifact_path: Some(artifact_path),
            error: None,
        }
    }

    pub fn failed(language: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            status: InstallStatus::Failed,
            timestamp: Utc::now(),
            artifact_path: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == InstallStatus::Success
    }

    /// A success that produced an artifact in the current layout. Legacy
    /// imports carry no artifact path and must be rebuilt.
    pub fn has_artifact(&self) -> bool {
        self.is_success() && self.artifact_path.is_some()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerFile {
    version: u32,
    languages: BTreeMap<String, InstallRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredLedger {
    Current(LedgerFile),
    /// Plain array of installed language names
    Legacy(Vec<String>),
}

/// Mapping from language identifier to its latest install record
#[derive(Debug)]
pub struct InstallLedger {
    path: PathBuf,
    records: BTreeMap<String, InstallRecord>,
}

impl InstallLedger {
    /// Load the ledger at `path`. A missing file is an empty ledger; an
    /// unreadable one is logged and also treated as empty.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let records = match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&path, &content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read ledger, starting empty");
                BTreeMap::new()
            }
        };

        debug!(path = %path.display(), records = records.len(), "Loaded ledger");
        Ok(Self { path, records })
    }

    fn parse(path: &Path, content: &str) -> BTreeMap<String, InstallRecord> {
        if content.trim().is_empty() {
            return BTreeMap::new();
        }

        match serde_json::from_str::<StoredLedger>(content) {
            Ok(StoredLedger::Current(file)) => {
                if file.version > LEDGER_VERSION {
                    warn!(
                        path = %path.display(),
                        version = file.version,
                        "Ledger written by a newer version"
                    );
                }
                file.languages
            }
            Ok(StoredLedger::Legacy(names)) => {
                let timestamp = fs::metadata(path)
                    .and_then(|m| m.modified())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                debug!(count = names.len(), "Importing legacy ledger");

                names
                    .into_iter()
                    .map(|name| {
                        let record = InstallRecord {
                            language: name.clone(),
                            status: InstallStatus::Success,
                            timestamp,
                            artifact_path: None,
                            error: None,
                        };
                        (name, record)
                    })
                    .collect()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ledger is unparseable, starting empty");
                BTreeMap::new()
            }
        }
    }

    /// Replace the record for `record.language` and persist immediately
    pub fn record(&mut self, record: InstallRecord) -> Result<()> {
        debug!(
            language = %record.language,
            status = ?record.status,
            "Recording install outcome"
        );
        self.records.insert(record.language.clone(), record);
        self.save()
    }

    /// True only when the latest record is a success with a recorded artifact
    pub fn is_installed(&self, language: &str) -> bool {
        self.records
            .get(language)
            .is_some_and(InstallRecord::has_artifact)
    }

    pub fn get(&self, language: &str) -> Option<&InstallRecord> {
        self.records.get(language)
    }

    pub fn records(&self) -> impl Iterator<Item = &InstallRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the ledger through a temp file in the same directory and rename it
    /// over the old one, so readers never see a torn file.
    fn save(&self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| LedgerError::DirectoryFailed {
            path: parent.clone(),
            error: e.to_string(),
        })?;

        let file = LedgerFile {
            version: LEDGER_VERSION,
            languages: self.records.clone(),
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| {
            LedgerError::SerializeFailed {
                error: e.to_string(),
            }
        })?;

        let write_failed = |error: String| LedgerError::WriteFailed {
            path: self.path.clone(),
            error,
        };

        let mut temp = NamedTempFile::new_in(&parent).map_err(|e| write_failed(e.to_string()))?;
        temp.write_all(json.as_bytes())
            .and_then(|_| temp.write_all(b"\n"))
            .and_then(|_| temp.as_file().sync_all())
            .map_err(|e| write_failed(e.to_string()))?;
        temp.persist(&self.path)
            .map_err(|e| write_failed(e.error.to_string()))?;

        Ok(())
    }
}

/// Exclusive lock on the install directory, released on drop
#[derive(Debug)]
pub struct InstallLock {
    _file: fs::File,
    path: PathBuf,
}

impl InstallLock {
    /// Take the run lock without waiting; a concurrent holder yields `LedgerError::Locked`
    pub fn acquire(install_dir: &Path) -> Result<Self> {
        fs::create_dir_all(install_dir).map_err(|e| LedgerError::DirectoryFailed {
            path: install_dir.to_path_buf(),
            error: e.to_string(),
        })?;

        let path = install_dir.join(LOCK_FILE_NAME);
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&path)
            .map_err(|e| LedgerError::WriteFailed {
                path: path.clone(),
                error: e.to_string(),
            })?;

        file.try_lock_exclusive()
            .map_err(|_| LedgerError::Locked { path: path.clone() })?;

        debug!(path = %path.display(), "Acquired install lock");
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let ledger = InstallLedger::load(temp.path().join(LEDGER_FILE_NAME)).unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.is_installed("python"));
    }

    #[test]
    fn test_record_is_written_through() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LEDGER_FILE_NAME);

        let mut ledger = InstallLedger::load(&path).unwrap();
        ledger
            .record(InstallRecord::success("python", temp.path().join("python.so")))
            .unwrap();
        ledger
            .record(InstallRecord::failed("json", "network unreachable"))
            .unwrap();

        let reloaded = InstallLedger::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.is_installed("python"));
        assert!(!reloaded.is_installed("json"));
        assert_eq!(
            reloaded.get("json").and_then(|r| r.error.as_deref()),
            Some("network unreachable")
        );
    }

    #[test]
    fn test_latest_record_wins() {
        let temp = TempDir::new().unwrap();
        let mut ledger = InstallLedger::load(temp.path().join(LEDGER_FILE_NAME)).unwrap();

        ledger.record(InstallRecord::failed("go", "boom")).unwrap();
        assert!(!ledger.is_installed("go"));
        ledger
            .record(InstallRecord::success("go", PathBuf::from("go.so")))
            .unwrap();
        assert!(ledger.is_installed("go"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_legacy_array_imported_for_rebuild() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LEDGER_FILE_NAME);
        fs::write(&path, r#"["python", "rust"]"#).unwrap();

        let ledger = InstallLedger::load(&path).unwrap();
        assert_eq!(ledger.len(), 2);
        let rust = ledger.get("rust").unwrap();
        assert!(rust.is_success());
        assert!(rust.artifact_path.is_none());
        assert!(!ledger.is_installed("python"));
        assert!(!ledger.is_installed("rust"));
    }

    #[test]
    fn test_garbage_ledger_treated_as_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LEDGER_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        let ledger = InstallLedger::load(&path).unwrap();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_status_serialized_lowercase() {
        let record = InstallRecord::failed("c", "exit 1");
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        assert!(!json.contains("artifact_path"));
    }

    #[test]
    fn test_lock_is_exclusive() {
        let temp = TempDir::new().unwrap();
        let first = InstallLock::acquire(temp.path()).unwrap();
        assert!(first.path().ends_with(LOCK_FILE_NAME));

        let second = InstallLock::acquire(temp.path());
        match second {
            Err(crate::error::SetupError::Ledger(e)) => {
                assert!(matches!(*e, LedgerError::Locked { .. }))
            }
            other => panic!("expected lock contention, got {other:?}"),
        }

        drop(first);
        assert!(InstallLock::acquire(temp.path()).is_ok());
    }
}
