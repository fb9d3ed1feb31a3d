//! Domain types for the hosting service.
//!
//! Platform-agnostic shapes the provisioner works with. The GitLab client
//! converts its wire types into these.

use serde::Serialize;
use thiserror::Error;

/// Account the run acts as. Commits are authored under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub name: String,
    pub email: String,
}

/// Remote project as known to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub path_with_namespace: String,
    /// Empty when the project has never received a commit.
    pub default_branch: String,
    pub push_uri: String,
}

impl Project {
    pub fn has_default_branch(&self) -> bool {
        !self.default_branch.is_empty()
    }
}

/// Group or user namespace a project can live under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub id: u64,
    pub full_path: String,
}

/// Project creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateProject {
    pub path: String,
    pub name: String,
    /// `None` creates the project in the acting user's own namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_id: Option<u64>,
    /// Some plan tiers reject project creation with a database error unless
    /// this is sent explicitly.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approvals_before_merge: Option<u32>,
}

/// Hosting API failure.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("credential rejected ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("host answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}
