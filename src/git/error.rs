//! Git operation error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from a single git strategy attempt.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GitError {
    /// The external tool could not be launched at all.
    #[error("could not start {}: {source}", .program.display())]
    NotStarted {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("`git {command}` exited with {status}: {stderr}")]
    Exited {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("push rejected for {reference}: {message}")]
    Rejected { reference: String, message: String },

    #[error("repository has no working directory")]
    NoWorkdir,

    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Git(#[from] git2::Error),
}

impl GitError {
    /// Only a failure to start moves an operation to the fallback strategy.
    pub fn is_not_started(&self) -> bool {
        matches!(self, GitError::NotStarted { .. })
    }
}
