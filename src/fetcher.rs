// Repository acquisition: clone, update, or repair the local copy of a grammar repository

use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{FetchOptions, RemoteCallbacks, Repository, ResetType};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{FetchError, FetchErrorKind, Result};
use crate::logging::utils::git_operation_span;
use crate::registry::LanguageSpec;

/// How the local clone was brought up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Fresh clone into an empty destination
    Cloned,
    /// Existing clone fast-forwarded to the remote head
    Updated,
    /// Existing clone restored to its HEAD because the update failed
    Stale,
    /// Invalid destination removed and cloned again
    Recovered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    /// Root of the clone
    pub clone_dir: PathBuf,
    /// Grammar directory (clone root joined with the language's subpath)
    pub source_root: PathBuf,
    pub outcome: FetchOutcome,
}

/// Obtains grammar sources for a language
pub trait Fetcher {
    fn fetch(&self, spec: &LanguageSpec, destination: &Path) -> Result<FetchResult>;
}

/// libgit2-backed fetcher
#[derive(Debug, Default, Clone)]
pub struct GitFetcher;

impl GitFetcher {
    pub fn new() -> Self {
        Self
    }

    fn fetch_options<'a>() -> FetchOptions<'a> {
        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(|progress| {
            if progress.received_objects() == progress.total_objects() {
                debug!(
                    "Resolving deltas {}/{}",
                    progress.indexed_deltas(),
                    progress.total_deltas()
                );
            }
            true
        });

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(callbacks);
        fetch_options
    }

    fn clone_into(
        &self,
        spec: &LanguageSpec,
        destination: &Path,
    ) -> std::result::Result<(), git2::Error> {
        debug!("Cloning {} into {}", spec.repository, destination.display());

        let mut builder = RepoBuilder::new();
        builder.fetch_options(Self::fetch_options());
        let repo = builder.clone(&spec.repository, destination)?;

        if spec.submodules {
            update_submodules(&repo)?;
        }

        Ok(())
    }

    fn update(&self, spec: &LanguageSpec, repo: &Repository) -> std::result::Result<(), git2::Error> {
        let mut remote = repo.find_remote("origin")?;
        remote.fetch::<&str>(&[], Some(&mut Self::fetch_options()), None)?;

        let head = repo.head()?;
        let tracking = head
            .shorthand()
            .filter(|_| head.is_branch())
            .map(|branch| format!("refs/remotes/origin/{branch}"));

        let target = match tracking.map(|name| repo.find_reference(&name)) {
            Some(Ok(reference)) => reference,
            _ => repo.find_reference("FETCH_HEAD")?,
        };
        let commit = target.peel_to_commit()?;

        // Unconditional: a checkout interrupted after HEAD moved leaves missing files
        debug!("Resetting {} to {}", spec.id, commit.id());
        repo.reset(commit.as_object(), ResetType::Hard, None)?;

        if spec.submodules {
            update_submodules(repo)?;
        }

        Ok(())
    }
}

impl Fetcher for GitFetcher {
    fn fetch(&self, spec: &LanguageSpec, destination: &Path) -> Result<FetchResult> {
        let _span = git_operation_span("fetch", Some(&spec.repository)).entered();

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        let outcome = if !destination.exists() {
            self.clone_into(spec, destination)
                .map_err(|e| FetchError::from_git(&spec.id, &spec.repository, &e))?;
            FetchOutcome::Cloned
        } else if let Some(repo) = open_valid_clone(destination) {
            match self.update(spec, &repo) {
                Ok(()) => FetchOutcome::Updated,
                Err(e) => {
                    warn!(
                        language = %spec.id,
                        error = %e.message(),
                        "Update failed, using existing sources"
                    );
                    restore_worktree(&repo)
                        .map_err(|e| FetchError::from_git(&spec.id, &spec.repository, &e))?;
                    FetchOutcome::Stale
                }
            }
        } else {
            warn!(
                language = %spec.id,
                path = %destination.display(),
                "Destination is not a valid clone, removing it"
            );
            remove_path(destination).map_err(|e| {
                FetchError::new(
                    &spec.id,
                    &spec.repository,
                    FetchErrorKind::CorruptClone,
                    format!("cannot remove {}: {e}", destination.display()),
                )
            })?;
            self.clone_into(spec, destination)
                .map_err(|e| FetchError::from_git(&spec.id, &spec.repository, &e))?;
            FetchOutcome::Recovered
        };

        info!(language = %spec.id, outcome = ?outcome, "Sources ready");

        let source_root = match &spec.subpath {
            Some(subpath) => destination.join(subpath),
            None => destination.to_path_buf(),
        };

        Ok(FetchResult {
            clone_dir: destination.to_path_buf(),
            source_root,
            outcome,
        })
    }
}

/// Open `path` only if it is a non-bare repository with a resolvable HEAD
pub fn open_valid_clone(path: &Path) -> Option<Repository> {
    let repo = Repository::open(path).ok()?;
    if repo.is_bare() || repo.head().is_err() {
        return None;
    }
    // The working tree must be the destination itself, not an enclosing checkout
    let workdir = repo.workdir()?.canonicalize().ok()?;
    if workdir != path.canonicalize().ok()? {
        return None;
    }
    Some(repo)
}

/// Force the working tree back to HEAD, restoring deleted or modified files
fn restore_worktree(repo: &Repository) -> std::result::Result<(), git2::Error> {
    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_head(Some(&mut checkout))
}

fn update_submodules(repo: &Repository) -> std::result::Result<(), git2::Error> {
    for mut submodule in repo.submodules()? {
        debug!("Updating submodule {}", submodule.path().display());
        submodule.update(true, None)?;
    }
    Ok(())
}

fn remove_path(path: &Path) -> std::io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_git_errors() {
        let auth = git2::Error::new(
            git2::ErrorCode::Auth,
            git2::ErrorClass::Http,
            "authentication required",
        );
        assert_eq!(
            FetchError::from_git("x", "u", &auth).kind,
            FetchErrorKind::AuthFailure
        );

        let odb = git2::Error::new(
            git2::ErrorCode::GenericError,
            git2::ErrorClass::Odb,
            "object not found",
        );
        assert_eq!(
            FetchError::from_git("x", "u", &odb).kind,
            FetchErrorKind::CorruptClone
        );

        let net = git2::Error::new(
            git2::ErrorCode::GenericError,
            git2::ErrorClass::Net,
            "failed to resolve address",
        );
        assert_eq!(
            FetchError::from_git("x", "u", &net).kind,
            FetchErrorKind::NetworkFailure
        );
    }

    #[test]
    fn test_open_valid_clone_rejects_plain_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(open_valid_clone(temp.path()).is_none());
    }

    #[test]
    fn test_open_valid_clone_rejects_unborn_head() {
        let temp = tempfile::TempDir::new().unwrap();
        Repository::init(temp.path()).unwrap();
        assert!(open_valid_clone(temp.path()).is_none());
    }
}
