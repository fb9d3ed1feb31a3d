//! Hosting service abstraction.
//!
//! "Do X": Look up, create, and unlock remote projects.
//!
//! The provisioner only talks to [`HostingApi`]; the GitLab REST client is
//! one implementation and tests plug in an in-memory one.
//!
//! # Example
//!
//! ```no_run
//! use force_upload::forge::{gitlab::GitLabClient, HostingApi};
//! use force_upload::Token;
//!
//! let client = GitLabClient::new("https://gitlab.com/", Token::new("glpat-..."))?;
//! let me = client.current_user()?;
//! println!("acting as {}", me.username);
//! # Ok::<(), force_upload::forge::ApiError>(())
//! ```

mod types;

pub mod gitlab;

pub use types::*;

/// Operations the provisioner needs from the hosting service.
///
/// Lookups answer `Ok(None)` for a missing resource; every other failure is
/// an [`ApiError`].
pub trait HostingApi {
    /// Resolve the account the credential belongs to.
    fn current_user(&self) -> Result<Identity, ApiError>;

    /// Find a project by its full path (`group/sub/name`).
    fn get_project(&self, path: &str) -> Result<Option<Project>, ApiError>;

    /// Find a namespace by its full path.
    fn get_namespace(&self, path: &str) -> Result<Option<Namespace>, ApiError>;

    fn create_project(&self, request: &CreateProject) -> Result<Project, ApiError>;

    /// Remove push protection from a branch. A branch that is not protected
    /// is not an error.
    fn unprotect_branch(&self, project_id: u64, branch: &str) -> Result<(), ApiError>;
}
