//! Git plumbing for the upload
//!
//! Handles:
//! - Resetting and re-initializing local metadata
//! - Staging and committing through a preferred/fallback strategy pair
//! - Registering the remote and force-pushing the branch
//!
//! Each operation first runs through the external `git` executable
//! ([`GitCli`]). When that cannot even be started, the same operation runs
//! in-process through libgit2 ([`InProcess`]). A tool that starts and then
//! fails is a real failure and is not retried.

mod cli;
mod direct;
mod error;
pub mod publish;
pub mod snapshot;

pub use cli::GitCli;
pub use direct::InProcess;
pub use error::GitError;

use chrono::{DateTime, Utc};
use git2::Repository;
use std::fmt;

use crate::credential::Token;
use crate::events::{Event, EventSink};

/// Name of the remote registered for the push.
pub const REMOTE_NAME: &str = "origin";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Stage,
    Commit,
    Push,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Stage => "stage",
            Operation::Commit => "commit",
            Operation::Push => "push",
        })
    }
}

/// What the remote reported for the pushed ref.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Updated,
    UpToDate,
}

/// Message, author and timestamp for the snapshot commit.
#[derive(Debug, Clone)]
pub struct CommitSpec<'a> {
    pub message: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub when: DateTime<Utc>,
}

impl CommitSpec<'_> {
    /// `Name <email>` as git expects it for `--author`.
    pub fn author(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

/// Target and transport credentials for the push.
#[derive(Debug, Clone)]
pub struct PushSpec<'a> {
    pub uri: &'a str,
    pub branch: &'a str,
    pub username: &'a str,
    pub token: &'a Token,
}

impl PushSpec<'_> {
    /// Forced refspec mapping the local branch onto the same remote branch.
    pub fn refspec(&self) -> String {
        format!("+refs/heads/{0}:refs/heads/{0}", self.branch)
    }
}

/// One way of carrying out the git operations.
pub trait Strategy {
    fn name(&self) -> &'static str;

    /// Stage every file in the working tree.
    fn stage_all(&self, repo: &Repository) -> Result<(), GitError>;

    /// Commit the index onto HEAD.
    fn commit(&self, repo: &Repository, commit: &CommitSpec<'_>) -> Result<(), GitError>;

    /// Force-push the branch.
    fn push(&self, repo: &Repository, push: &PushSpec<'_>) -> Result<PushOutcome, GitError>;
}

/// Preferred strategy plus the fallback used when it cannot start.
pub struct Engine {
    preferred: Box<dyn Strategy>,
    fallback: Box<dyn Strategy>,
}

impl Engine {
    pub fn new(preferred: Box<dyn Strategy>, fallback: Box<dyn Strategy>) -> Self {
        Self {
            preferred,
            fallback,
        }
    }

    /// External `git` from PATH, falling back to libgit2.
    pub fn standard(verbose: bool) -> Self {
        Self::new(Box::new(GitCli::locate(verbose)), Box::new(InProcess))
    }

    pub(crate) fn run<T>(
        &self,
        operation: Operation,
        sink: &dyn EventSink,
        attempt: impl Fn(&dyn Strategy) -> Result<T, GitError>,
    ) -> Result<T, GitError> {
        match attempt(self.preferred.as_ref()) {
            Err(err) if err.is_not_started() => {
                sink.emit(&Event::FallbackEngaged {
                    operation,
                    from: self.preferred.name(),
                    to: self.fallback.name(),
                    reason: err.to_string(),
                });
                attempt(self.fallback.as_ref())
            }
            result => result,
        }
    }
}
