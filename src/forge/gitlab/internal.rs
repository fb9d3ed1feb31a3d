//! Internal implementation for the GitLab client.
//!
//! Contains REST calls and JSON parsing.
//! Not exposed in public interface.

use reqwest::blocking::{Client as HttpClient, Response};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::credential::Token;
use crate::forge::{ApiError, CreateProject, Identity, Namespace, Project};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// GitLab JSON types (internal, match API v4 output format)
// ============================================================================

#[derive(Debug, Deserialize)]
struct GlUser {
    id: u64,
    username: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    commit_email: Option<String>,
    #[serde(default)]
    public_email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlProject {
    id: u64,
    path_with_namespace: String,
    #[serde(default)]
    default_branch: Option<String>,
    http_url_to_repo: String,
}

#[derive(Debug, Deserialize)]
struct GlNamespace {
    id: u64,
    full_path: String,
}

// ============================================================================
// HTTP plumbing
// ============================================================================

/// Authenticated handle on `<base>/api/v4/`.
pub(super) struct Api {
    http: HttpClient,
    root: String,
    host: String,
    token: Token,
}

impl Api {
    pub(super) fn new(base_url: &str, token: Token) -> Result<Self, ApiError> {
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let host = reqwest::Url::parse(&base)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_default();

        let http = HttpClient::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("gitlab-force-upload/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ApiError::Transport {
                endpoint: base.clone(),
                source,
            })?;

        Ok(Self {
            http,
            root: format!("{}api/v4/", base),
            host,
            token,
        })
    }

    fn send(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&CreateProject>,
    ) -> Result<Response, ApiError> {
        let url = format!("{}{}", self.root, endpoint);
        tracing::debug!(%method, %url, "gitlab request");

        let mut request = self
            .http
            .request(method, &url)
            .bearer_auth(self.token.expose());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().map_err(|source| ApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(status_error(endpoint, response))
        }
    }

    fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let response = self.send(Method::GET, endpoint, None)?;
        decode(endpoint, response)
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, ApiError> {
    let body = response.text().map_err(|source| ApiError::Transport {
        endpoint: endpoint.to_string(),
        source,
    })?;
    serde_json::from_str(&body).map_err(|source| ApiError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

fn status_error(endpoint: &str, response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    let message = error_message(&body);

    match status {
        401 | 403 => ApiError::Unauthorized { status, message },
        404 => ApiError::NotFound(endpoint.to_string()),
        _ => ApiError::Status { status, message },
    }
}

/// Pull the human-readable part out of a GitLab error body.
///
/// GitLab answers `{"message": "..."}`, `{"message": {"field": ["..."]}}` or
/// `{"error": "..."}` depending on the endpoint.
fn error_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return body.trim().to_string();
    };

    match value.get("message").or_else(|| value.get("error")) {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => body.trim().to_string(),
    }
}

fn optional<T>(result: Result<T, ApiError>) -> Result<Option<T>, ApiError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

// ============================================================================
// Public functions (called by GitLabClient)
// ============================================================================

pub(crate) fn fetch_current_user(api: &Api) -> Result<Identity, ApiError> {
    let user: GlUser = api.get("user")?;
    Ok(into_identity(user, &api.host))
}

fn project_endpoint(path: &str) -> String {
    format!("projects/{}", urlencoding::encode(path))
}

fn namespace_endpoint(path: &str) -> String {
    format!("namespaces/{}", urlencoding::encode(path))
}

fn protected_branch_endpoint(project_id: u64, branch: &str) -> String {
    format!(
        "projects/{}/protected_branches/{}",
        project_id,
        urlencoding::encode(branch)
    )
}

pub(crate) fn fetch_project(api: &Api, path: &str) -> Result<Option<Project>, ApiError> {
    let endpoint = project_endpoint(path);
    optional(api.get::<GlProject>(&endpoint)).map(|project| project.map(into_project))
}

pub(crate) fn fetch_namespace(api: &Api, path: &str) -> Result<Option<Namespace>, ApiError> {
    let endpoint = namespace_endpoint(path);
    optional(api.get::<GlNamespace>(&endpoint)).map(|namespace| {
        namespace.map(|ns| Namespace {
            id: ns.id,
            full_path: ns.full_path,
        })
    })
}

pub(crate) fn create_project(api: &Api, request: &CreateProject) -> Result<Project, ApiError> {
    let response = api.send(Method::POST, "projects", Some(request))?;
    let project: GlProject = decode("projects", response)?;
    Ok(into_project(project))
}

pub(crate) fn unprotect_branch(api: &Api, project_id: u64, branch: &str) -> Result<(), ApiError> {
    let endpoint = protected_branch_endpoint(project_id, branch);
    match api.send(Method::DELETE, &endpoint, None) {
        Ok(_) => Ok(()),
        // Not protected in the first place
        Err(err) if err.is_not_found() => Ok(()),
        Err(err) => Err(err),
    }
}

// ============================================================================
// Conversion
// ============================================================================

fn into_identity(user: GlUser, host: &str) -> Identity {
    let email = [user.commit_email, user.email, user.public_email]
        .into_iter()
        .flatten()
        .find(|email| !email.is_empty())
        .unwrap_or_else(|| format!("{}-{}@users.noreply.{}", user.id, user.username, host));

    let name = if user.name.is_empty() {
        user.username.clone()
    } else {
        user.name
    };

    Identity {
        username: user.username,
        name,
        email,
    }
}

fn into_project(project: GlProject) -> Project {
    Project {
        id: project.id,
        path_with_namespace: project.path_with_namespace,
        default_branch: project.default_branch.unwrap_or_default(),
        push_uri: project.http_url_to_repo,
    }
}
