//! Local snapshot: throw away old metadata, re-init, stage, commit.

use chrono::{DateTime, Utc};
use git2::{Oid, Repository, RepositoryInitOptions};
use std::fs;
use std::path::Path;

use super::{CommitSpec, Engine, GitError, Operation};
use crate::error::{Stage, SyncError};
use crate::events::{Event, EventSink};
use crate::forge::Identity;

/// Freshly built single-commit repository, ready to push.
pub struct Snapshot {
    pub repo: Repository,
    pub branch: String,
    pub commit: Oid,
}

/// What goes into the snapshot commit.
#[derive(Debug, Clone)]
pub struct SnapshotRequest<'a> {
    pub folder: &'a Path,
    pub message: &'a str,
    pub identity: &'a Identity,
    pub branch: &'a str,
    pub when: DateTime<Utc>,
}

/// Rebuild the folder's repository as exactly one commit of its current files.
///
/// Working files are never modified; only `<folder>/.git` is replaced.
pub fn build(
    request: &SnapshotRequest<'_>,
    engine: &Engine,
    sink: &dyn EventSink,
) -> Result<Snapshot, SyncError> {
    let folder = request.folder;
    let step = |step: &str| {
        sink.emit(&Event::StepStarted {
            stage: Stage::Snapshot,
            step: step.to_string(),
        })
    };

    ensure_directory(folder).map_err(|e| SyncError::local("access folder", folder, e))?;

    step("remove existing metadata");
    if remove_metadata(folder).map_err(|e| SyncError::local("remove existing metadata", folder, e))? {
        tracing::debug!(folder = %folder.display(), "deleted existing repository");
    }

    step("initialize repository");
    let repo = init(folder, request.branch)
        .map_err(|e| SyncError::local("initialize repository", folder, e))?;

    step("stage files");
    engine
        .run(Operation::Stage, sink, |strategy| strategy.stage_all(&repo))
        .map_err(|e| SyncError::local("stage files", folder, e))?;

    step("create commit");
    let spec = CommitSpec {
        message: request.message,
        name: &request.identity.name,
        email: &request.identity.email,
        when: request.when,
    };
    tracing::debug!(commit_message = spec.message, author = %spec.author(), "committing");
    engine
        .run(Operation::Commit, sink, |strategy| strategy.commit(&repo, &spec))
        .map_err(|e| SyncError::local("create commit", folder, e))?;

    let commit = head_commit(&repo).map_err(|e| SyncError::local("read new commit", folder, e))?;

    Ok(Snapshot {
        repo,
        branch: request.branch.to_string(),
        commit,
    })
}

fn ensure_directory(folder: &Path) -> Result<(), GitError> {
    let metadata = fs::metadata(folder)?;
    if !metadata.is_dir() {
        return Err(GitError::NotADirectory(folder.to_path_buf()));
    }
    Ok(())
}

/// Delete `<folder>/.git` (directory or gitfile). Returns whether anything was there.
fn remove_metadata(folder: &Path) -> Result<bool, GitError> {
    let git_dir = folder.join(".git");
    let metadata = match fs::symlink_metadata(&git_dir) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    if metadata.is_dir() {
        fs::remove_dir_all(&git_dir)?;
    } else {
        fs::remove_file(&git_dir)?;
    }
    Ok(true)
}

fn init(folder: &Path, branch: &str) -> Result<Repository, GitError> {
    let mut options = RepositoryInitOptions::new();
    options.initial_head(branch).mkdir(false);
    Ok(Repository::init_opts(folder, &options)?)
}

fn head_commit(repo: &Repository) -> Result<Oid, GitError> {
    Ok(repo.head()?.peel_to_commit()?.id())
}
