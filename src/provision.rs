//! Remote provisioner.
//!
//! "Do X": Make sure the destination project exists and accepts a force push.
//!
//! Re-running against an existing project is not an error: the project is
//! looked up first and only created when missing. Parent namespaces are
//! never created.

use crate::config::SyncConfig;
use crate::credential::Token;
use crate::error::{Stage, SyncError};
use crate::events::{Event, EventSink};
use crate::forge::{CreateProject, HostingApi, Identity, Project};

/// Everything the later stages need from the host.
#[derive(Debug, Clone)]
pub struct Provisioned<'t> {
    pub project: Project,
    pub identity: Identity,
    /// Same token the run started with.
    pub token: &'t Token,
    /// Whether this run created the project.
    pub created: bool,
}

impl Provisioned<'_> {
    pub fn push_uri(&self) -> &str {
        &self.project.push_uri
    }

    /// Branch to push: the project's default, or `fallback` for a project
    /// without history.
    pub fn branch<'a>(&'a self, fallback: &'a str) -> &'a str {
        if self.project.has_default_branch() {
            &self.project.default_branch
        } else {
            fallback
        }
    }
}

pub fn provision<'t>(
    api: &dyn HostingApi,
    token: &'t Token,
    config: &SyncConfig,
    sink: &dyn EventSink,
) -> Result<Provisioned<'t>, SyncError> {
    let step = |step: String| {
        sink.emit(&Event::StepStarted {
            stage: Stage::Provision,
            step,
        })
    };
    let destination = config.destination.as_str();

    step("resolve acting user".to_string());
    let identity = api.current_user().map_err(SyncError::Authentication)?;
    tracing::debug!(username = %identity.username, "authenticated");

    let lookup = qualified_path(destination, &identity);
    step(format!("look up project {}", lookup));
    let existing = api
        .get_project(&lookup)
        .map_err(|e| SyncError::hosting(format!("look up project {}", lookup), e))?;

    let (project, created) = match existing {
        Some(project) => {
            tracing::debug!(
                project = %project.path_with_namespace,
                "not creating project: already exists"
            );
            (project, false)
        }
        None => {
            step(format!("create project {}", destination));
            (create(api, config)?, true)
        }
    };

    if project.has_default_branch() {
        step(format!("unprotect branch {}", project.default_branch));
        api.unprotect_branch(project.id, &project.default_branch)
            .map_err(|e| {
                SyncError::hosting(
                    format!(
                        "unprotect branch {} of {}",
                        project.default_branch, project.path_with_namespace
                    ),
                    e,
                )
            })?;
    } else {
        tracing::debug!(
            project = %project.path_with_namespace,
            "not unprotecting: project has no default branch"
        );
    }

    Ok(Provisioned {
        project,
        identity,
        token,
        created,
    })
}

fn create(api: &dyn HostingApi, config: &SyncConfig) -> Result<Project, SyncError> {
    let destination = config.destination.as_str();
    let (parent, leaf) = split_path(destination);

    let namespace_id = match parent {
        Some(parent) => match api.get_namespace(parent) {
            Ok(Some(namespace)) => Some(namespace.id),
            Ok(None) => {
                tracing::debug!(namespace = parent, "cannot create project: namespace does not exist");
                return Err(SyncError::NamespaceNotFound {
                    project: destination.to_string(),
                    namespace: parent.to_string(),
                });
            }
            Err(e) => {
                return Err(SyncError::hosting(format!("resolve namespace {}", parent), e));
            }
        },
        None => None,
    };

    let request = CreateProject {
        path: leaf.to_string(),
        name: leaf.to_string(),
        namespace_id,
        approvals_before_merge: config.approvals_workaround.then_some(0),
    };

    api.create_project(&request)
        .map_err(|e| SyncError::hosting(format!("create project {}", destination), e))
}

/// Full project path as the host stores it. A bare name lives in the acting
/// user's personal namespace.
fn qualified_path(destination: &str, identity: &Identity) -> String {
    match split_path(destination) {
        (Some(_), _) => destination.to_string(),
        (None, leaf) => format!("{}/{}", identity.username, leaf),
    }
}

/// Split `group/sub/name` into (`Some("group/sub")`, `"name"`).
pub fn split_path(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('/') {
        Some((parent, leaf)) => (Some(parent), leaf),
        None => (None, path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_nested() {
        assert_eq!(split_path("group/sub/app"), (Some("group/sub"), "app"));
    }

    #[test]
    fn test_split_single_level() {
        assert_eq!(split_path("group/app"), (Some("group"), "app"));
    }

    #[test]
    fn test_split_leaf_only() {
        assert_eq!(split_path("app"), (None, "app"));
    }

    #[test]
    fn test_qualified_path() {
        let identity = Identity {
            username: "ada".to_string(),
            name: "Ada".to_string(),
            email: "ada@x".to_string(),
        };
        assert_eq!(qualified_path("scratch", &identity), "ada/scratch");
        assert_eq!(qualified_path("group/app", &identity), "group/app");
    }

    #[test]
    fn test_branch_choice() {
        let token = Token::new("t");
        let mut provisioned = Provisioned {
            project: Project {
                id: 1,
                path_with_namespace: "g/p".to_string(),
                default_branch: String::new(),
                push_uri: "https://gitlab.com/g/p.git".to_string(),
            },
            identity: Identity {
                username: "u".to_string(),
                name: "U".to_string(),
                email: "u@x".to_string(),
            },
            token: &token,
            created: true,
        };
        assert_eq!(provisioned.branch("main"), "main");

        provisioned.project.default_branch = "master".to_string();
        assert_eq!(provisioned.branch("main"), "master");
    }
}
