//! Remote publisher: point `origin` at the project and force-push.

use git2::{ErrorCode, Repository};

use super::snapshot::Snapshot;
use super::{Engine, GitError, Operation, PushOutcome, PushSpec, REMOTE_NAME};
use crate::credential::Token;
use crate::error::{Stage, SyncError};
use crate::events::{Event, EventSink};
use crate::forge::Identity;

/// Force-overwrite the remote branch with the snapshot commit.
///
/// An unchanged remote is reported as [`PushOutcome::UpToDate`], not an error.
pub fn publish(
    snapshot: &Snapshot,
    push_uri: &str,
    identity: &Identity,
    token: &Token,
    engine: &Engine,
    sink: &dyn EventSink,
) -> Result<PushOutcome, SyncError> {
    sink.emit(&Event::StepStarted {
        stage: Stage::Publish,
        step: format!("register remote {} -> {}", REMOTE_NAME, push_uri),
    });
    register_remote(&snapshot.repo, push_uri).map_err(|source| SyncError::Publish {
        action: "register remote",
        source,
    })?;

    sink.emit(&Event::StepStarted {
        stage: Stage::Publish,
        step: format!("force-push {}", snapshot.branch),
    });
    let spec = PushSpec {
        uri: push_uri,
        branch: &snapshot.branch,
        username: &identity.username,
        token,
    };
    let outcome = engine
        .run(Operation::Push, sink, |strategy| {
            strategy.push(&snapshot.repo, &spec)
        })
        .map_err(|source| SyncError::Publish {
            action: "push",
            source,
        })?;

    sink.emit(&Event::PushCompleted { outcome });
    Ok(outcome)
}

/// Create `origin`, or repoint it if it already exists.
fn register_remote(repo: &Repository, uri: &str) -> Result<(), GitError> {
    match repo.find_remote(REMOTE_NAME) {
        Ok(_) => repo.remote_set_url(REMOTE_NAME, uri)?,
        Err(e) if e.code() == ErrorCode::NotFound => {
            repo.remote(REMOTE_NAME, uri)?;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_remote_twice_repoints() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();

        register_remote(&repo, "https://gitlab.com/a/old.git").unwrap();
        register_remote(&repo, "https://gitlab.com/a/new.git").unwrap();

        let remote = repo.find_remote(REMOTE_NAME).unwrap();
        assert_eq!(remote.url(), Some("https://gitlab.com/a/new.git"));
        assert_eq!(repo.remotes().unwrap().len(), 1);
    }
}
