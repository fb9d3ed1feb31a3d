//! External `git` executable strategy.

use git2::Repository;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::{CommitSpec, GitError, PushOutcome, PushSpec, Strategy};
use crate::credential::Token;

/// Runs git operations through the installed `git` binary.
///
/// Behaves exactly like git itself, ignore rules included.
/// stdout is shown only in verbose mode; stderr is captured so failures can
/// be reported, and echoed afterwards in verbose mode.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    verbose: bool,
}

impl GitCli {
    /// Use `git` from PATH.
    pub fn locate(verbose: bool) -> Self {
        let program = which::which("git").unwrap_or_else(|_| PathBuf::from("git"));
        Self::with_program(program, verbose)
    }

    pub fn with_program(program: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            program: program.into(),
            verbose,
        }
    }

    /// Run one git command in `dir`, returning its raw stderr.
    ///
    /// `label` is what gets logged and reported instead of the raw arguments,
    /// which may carry credentials. Anything shown to the user or put into an
    /// error has `token` scrubbed first; the returned text is not scrubbed.
    fn run(
        &self,
        dir: &Path,
        label: &str,
        args: &[&str],
        envs: &[(&str, String)],
        token: Option<&Token>,
    ) -> Result<String, GitError> {
        tracing::debug!(dir = %dir.display(), "running `git {}`", label);

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(dir)
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .env_remove("GIT_INDEX_FILE")
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .stdout(if self.verbose {
                Stdio::inherit()
            } else {
                Stdio::null()
            });
        for (key, value) in envs {
            cmd.env(key, value);
        }

        let output = cmd.output().map_err(|source| GitError::NotStarted {
            program: self.program.clone(),
            source,
        })?;

        let raw = String::from_utf8_lossy(&output.stderr).into_owned();
        let shown = || match token {
            Some(token) => token.scrub(&raw),
            None => raw.clone(),
        };
        if self.verbose && !raw.is_empty() {
            eprint!("{}", shown());
        }

        if !output.status.success() {
            return Err(GitError::Exited {
                command: label.to_string(),
                status: output.status.to_string(),
                stderr: shown().trim().to_string(),
            });
        }

        Ok(raw)
    }
}

impl Strategy for GitCli {
    fn name(&self) -> &'static str {
        "git-cli"
    }

    fn stage_all(&self, repo: &Repository) -> Result<(), GitError> {
        let dir = repo.workdir().ok_or(GitError::NoWorkdir)?;
        self.run(dir, "add -A .", &["add", "-A", "."], &[], None)?;
        Ok(())
    }

    fn commit(&self, repo: &Repository, commit: &CommitSpec<'_>) -> Result<(), GitError> {
        let dir = repo.workdir().ok_or(GitError::NoWorkdir)?;
        let author = commit.author();
        let date = git_date(commit);

        // Committer mirrors the author so the result does not depend on the
        // machine's git configuration.
        let envs = [
            ("GIT_AUTHOR_DATE", date.clone()),
            ("GIT_COMMITTER_NAME", commit.name.to_string()),
            ("GIT_COMMITTER_EMAIL", commit.email.to_string()),
            ("GIT_COMMITTER_DATE", date),
        ];

        self.run(
            dir,
            &format!("commit -m {:?} --author {:?}", commit.message, author),
            &[
                "-c",
                "commit.gpgsign=false",
                "commit",
                "--allow-empty",
                "--no-verify",
                "-m",
                commit.message,
                "--author",
                &author,
            ],
            &envs,
            None,
        )?;
        Ok(())
    }

    fn push(&self, repo: &Repository, push: &PushSpec<'_>) -> Result<PushOutcome, GitError> {
        let dir = repo.workdir().ok_or(GitError::NoWorkdir)?;
        let remote = authenticated_url(push.uri, push.username, push.token);
        let refspec = push.refspec();

        let stderr = self.run(
            dir,
            &format!("push --force {} {}", push.uri, refspec),
            &["push", "--force", &remote, &refspec],
            &[
                ("GIT_TERMINAL_PROMPT", "0".to_string()),
                // The up-to-date notice is only recognized untranslated.
                ("LC_ALL", "C".to_string()),
            ],
            Some(push.token),
        )?;

        Ok(push_outcome(&stderr))
    }
}

fn push_outcome(stderr: &str) -> PushOutcome {
    if stderr.contains("Everything up-to-date") {
        PushOutcome::UpToDate
    } else {
        PushOutcome::Updated
    }
}

/// Raw git date (`@<unix> +0000`) for the commit timestamp.
fn git_date(commit: &CommitSpec<'_>) -> String {
    format!("@{} +0000", commit.when.timestamp())
}

/// Embed `username:token@` into an http(s) URI; other URIs are returned as is.
pub(crate) fn authenticated_url(uri: &str, username: &str, token: &Token) -> String {
    let Ok(mut url) = reqwest::Url::parse(uri) else {
        return uri.to_string();
    };
    if !matches!(url.scheme(), "http" | "https") {
        return uri.to_string();
    }
    if url.set_username(username).is_err() || url.set_password(Some(token.expose())).is_err() {
        return uri.to_string();
    }
    url.to_string()
}
