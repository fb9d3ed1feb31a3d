//! Typed failures for a sync run.
//!
//! Every error carries the pipeline [`Stage`] it happened in and a
//! [`FailureKind`] the shell maps to an exit code.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::forge::ApiError;
use crate::git::GitError;

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Provision,
    Snapshot,
    Publish,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Provision => "provision",
            Stage::Snapshot => "snapshot",
            Stage::Publish => "publish",
        })
    }
}

/// Failure category, independent of the stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Authentication,
    ResourceNotFound,
    Provisioning,
    LocalRepository,
    Publish,
}

impl FailureKind {
    /// Process exit code used by the CLI shell.
    pub fn exit_code(self) -> i32 {
        match self {
            FailureKind::Authentication => 2,
            FailureKind::ResourceNotFound => 3,
            FailureKind::Provisioning => 4,
            FailureKind::LocalRepository => 5,
            FailureKind::Publish => 6,
        }
    }
}

/// First fatal error of a run.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    #[error("authentication failed: {0}")]
    Authentication(#[source] ApiError),

    #[error("cannot create project {project}: namespace {namespace} does not exist")]
    NamespaceNotFound { project: String, namespace: String },

    #[error("failed to {action}: {source}")]
    Provisioning {
        action: String,
        #[source]
        source: ApiError,
    },

    #[error("failed to {action} in {}: {source}", .folder.display())]
    LocalRepository {
        action: &'static str,
        folder: PathBuf,
        #[source]
        source: GitError,
    },

    #[error("failed to {action}: {source}")]
    Publish {
        action: &'static str,
        #[source]
        source: GitError,
    },
}

impl SyncError {
    /// Classify a hosting API failure; rejected credentials win over the action.
    pub(crate) fn hosting(action: impl Into<String>, source: ApiError) -> Self {
        if source.is_unauthorized() {
            SyncError::Authentication(source)
        } else {
            SyncError::Provisioning {
                action: action.into(),
                source,
            }
        }
    }

    pub(crate) fn local(action: &'static str, folder: &std::path::Path, source: GitError) -> Self {
        SyncError::LocalRepository {
            action,
            folder: folder.to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            SyncError::Authentication(_) => FailureKind::Authentication,
            SyncError::NamespaceNotFound { .. } => FailureKind::ResourceNotFound,
            SyncError::Provisioning { .. } => FailureKind::Provisioning,
            SyncError::LocalRepository { .. } => FailureKind::LocalRepository,
            SyncError::Publish { .. } => FailureKind::Publish,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            SyncError::Authentication(_)
            | SyncError::NamespaceNotFound { .. }
            | SyncError::Provisioning { .. } => Stage::Provision,
            SyncError::LocalRepository { .. } => Stage::Snapshot,
            SyncError::Publish { .. } => Stage::Publish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_is_authentication() {
        let err = SyncError::hosting(
            "create project",
            ApiError::Unauthorized {
                status: 401,
                message: "401 Unauthorized".to_string(),
            },
        );
        assert_eq!(err.kind(), FailureKind::Authentication);
        assert_eq!(err.stage(), Stage::Provision);
    }

    #[test]
    fn test_other_api_error_is_provisioning() {
        let err = SyncError::hosting(
            "create project group/app",
            ApiError::Status {
                status: 400,
                message: "name has already been taken".to_string(),
            },
        );
        assert_eq!(err.kind(), FailureKind::Provisioning);
        assert_eq!(
            err.to_string(),
            "failed to create project group/app: host answered 400: name has already been taken"
        );
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let kinds = [
            FailureKind::Authentication,
            FailureKind::ResourceNotFound,
            FailureKind::Provisioning,
            FailureKind::LocalRepository,
            FailureKind::Publish,
        ];
        let codes: std::collections::BTreeSet<i32> =
            kinds.iter().map(|k| k.exit_code()).collect();
        assert_eq!(codes.len(), kinds.len());
        assert!(codes.iter().all(|c| *c > 1));
    }

    #[test]
    fn test_local_error_names_folder() {
        let err = SyncError::local(
            "remove existing metadata",
            std::path::Path::new("/srv/site"),
            GitError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied")),
        );
        assert_eq!(err.stage(), Stage::Snapshot);
        assert!(err.to_string().contains("/srv/site"));
    }
}
