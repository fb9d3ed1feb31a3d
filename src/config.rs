//! Run configuration.
//!
//! Built once by the CLI and passed by reference into every stage.

use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://gitlab.com/";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Automatic upload";
pub const DEFAULT_BRANCH: &str = "main";

/// Configuration for one sync run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Hosting service base URL, always ending in `/`
    pub base_url: String,
    /// Folder whose contents are uploaded
    pub folder: PathBuf,
    /// Destination project path, e.g. `group/project`
    pub destination: String,
    pub commit_message: String,
    /// Branch pushed when the remote project has no default branch yet
    pub branch: String,
    /// Send `approvals_before_merge = 0` when creating a project
    pub approvals_workaround: bool,
    pub verbose: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("destination project path is empty")]
    EmptyDestination,

    #[error("invalid destination project path {0:?}")]
    InvalidDestination(String),

    #[error("invalid base URL {0:?}: expected http:// or https://")]
    InvalidBaseUrl(String),

    #[error("branch name is empty")]
    EmptyBranch,
}

impl SyncConfig {
    pub fn new(
        base_url: &str,
        folder: impl Into<PathBuf>,
        destination: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: normalize_base_url(base_url)?,
            folder: folder.into(),
            destination: validate_destination(destination)?,
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            approvals_workaround: false,
            verbose: false,
        })
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.commit_message = message.into();
        self
    }

    pub fn with_branch(mut self, branch: &str) -> Result<Self, ConfigError> {
        let branch = branch.trim();
        if branch.is_empty() {
            return Err(ConfigError::EmptyBranch);
        }
        self.branch = branch.to_string();
        Ok(self)
    }

    pub fn with_approvals_workaround(mut self, enabled: bool) -> Self {
        self.approvals_workaround = enabled;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let url = reqwest::Url::parse(trimmed)
        .map_err(|_| ConfigError::InvalidBaseUrl(raw.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
    }

    if trimmed.ends_with('/') {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("{}/", trimmed))
    }
}

fn validate_destination(raw: &str) -> Result<String, ConfigError> {
    let path = raw.trim().trim_matches('/');
    if path.is_empty() {
        return Err(ConfigError::EmptyDestination);
    }
    if path.split('/').any(|segment| segment.trim().is_empty()) {
        return Err(ConfigError::InvalidDestination(raw.to_string()));
    }
    Ok(path.to_string())
}
