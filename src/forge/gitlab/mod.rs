//! GitLab HostingApi implementation.
//!
//! "Do X": Provision projects through the GitLab v4 REST API.
//!
//! Uses a blocking reqwest client with bearer authentication.
//! All HTTP interaction hidden in internal.rs.

mod internal;

use super::{ApiError, CreateProject, HostingApi, Identity, Namespace, Project};
use crate::credential::Token;

/// GitLab implementation of HostingApi.
pub struct GitLabClient {
    api: internal::Api,
}

impl GitLabClient {
    /// Create a client for the instance at `base_url` (e.g. `https://gitlab.com/`).
    pub fn new(base_url: &str, token: Token) -> Result<Self, ApiError> {
        Ok(Self {
            api: internal::Api::new(base_url, token)?,
        })
    }
}

impl HostingApi for GitLabClient {
    fn current_user(&self) -> Result<Identity, ApiError> {
        internal::fetch_current_user(&self.api)
    }

    fn get_project(&self, path: &str) -> Result<Option<Project>, ApiError> {
        internal::fetch_project(&self.api, path)
    }

    fn get_namespace(&self, path: &str) -> Result<Option<Namespace>, ApiError> {
        internal::fetch_namespace(&self.api, path)
    }

    fn create_project(&self, request: &CreateProject) -> Result<Project, ApiError> {
        internal::create_project(&self.api, request)
    }

    fn unprotect_branch(&self, project_id: u64, branch: &str) -> Result<(), ApiError> {
        internal::unprotect_branch(&self.api, project_id, branch)
    }
}
