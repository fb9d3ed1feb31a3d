//! Shared fixtures: an in-memory hosting service and repository helpers.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;

use force_upload::forge::{ApiError, CreateProject, HostingApi, Identity, Namespace, Project};
use force_upload::git::{GitCli, InProcess};
use force_upload::Engine;
use git2::{ObjectType, Oid, Repository, TreeWalkMode, TreeWalkResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentUser,
    GetProject(String),
    GetNamespace(String),
    CreateProject(CreateProject),
    Unprotect(u64, String),
}

/// Hosting service double. Created projects get a bare repository under
/// `root`, whose filesystem path is the push URI.
pub struct FakeHost {
    identity: Identity,
    root: PathBuf,
    namespaces: Vec<Namespace>,
    projects: RefCell<Vec<Project>>,
    calls: RefCell<Vec<Call>>,
    next_id: Cell<u64>,
    reject_token: bool,
    unprotect_status: Option<u16>,
}

impl FakeHost {
    pub fn new(root: &Path) -> Self {
        Self {
            identity: ada(),
            root: root.to_path_buf(),
            namespaces: Vec::new(),
            projects: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
            next_id: Cell::new(100),
            reject_token: false,
            unprotect_status: None,
        }
    }

    pub fn with_namespace(mut self, path: &str) -> Self {
        let id = self.namespaces.len() as u64 + 10;
        self.namespaces.push(Namespace {
            id,
            full_path: path.to_string(),
        });
        self
    }

    /// Existing project backed by a bare repository.
    pub fn with_project(self, path: &str, default_branch: &str) -> Self {
        let push_uri = self.init_remote(path);
        self.insert(path, default_branch, push_uri);
        self
    }

    /// Existing project whose push URI points nowhere.
    pub fn with_unreachable_project(self, path: &str) -> Self {
        let push_uri = self.root.join("nowhere").join(format!("{}.git", path));
        self.insert(path, "", push_uri.to_string_lossy().into_owned());
        self
    }

    pub fn rejecting_token(mut self) -> Self {
        self.reject_token = true;
        self
    }

    pub fn failing_unprotect(mut self, status: u16) -> Self {
        self.unprotect_status = Some(status);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn creations(&self) -> Vec<CreateProject> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::CreateProject(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn unprotects(&self) -> Vec<(u64, String)> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                Call::Unprotect(id, branch) => Some((*id, branch.clone())),
                _ => None,
            })
            .collect()
    }

    /// Filesystem path of the bare repository behind `path`.
    pub fn remote_path(&self, path: &str) -> PathBuf {
        self.root.join(format!("{}.git", path))
    }

    fn init_remote(&self, path: &str) -> String {
        let remote = self.remote_path(path);
        fs::create_dir_all(&remote).unwrap();
        Repository::init_bare(&remote).unwrap();
        remote.to_string_lossy().into_owned()
    }

    fn insert(&self, path: &str, default_branch: &str, push_uri: String) -> Project {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let project = Project {
            id,
            path_with_namespace: path.to_string(),
            default_branch: default_branch.to_string(),
            push_uri,
        };
        self.projects.borrow_mut().push(project.clone());
        project
    }

    fn record(&self, call: Call) -> Result<(), ApiError> {
        self.calls.borrow_mut().push(call);
        if self.reject_token {
            return Err(ApiError::Unauthorized {
                status: 401,
                message: "401 Unauthorized".to_string(),
            });
        }
        Ok(())
    }
}

impl HostingApi for FakeHost {
    fn current_user(&self) -> Result<Identity, ApiError> {
        self.record(Call::CurrentUser)?;
        Ok(self.identity.clone())
    }

    fn get_project(&self, path: &str) -> Result<Option<Project>, ApiError> {
        self.record(Call::GetProject(path.to_string()))?;
        Ok(self
            .projects
            .borrow()
            .iter()
            .find(|p| p.path_with_namespace == path)
            .cloned())
    }

    fn get_namespace(&self, path: &str) -> Result<Option<Namespace>, ApiError> {
        self.record(Call::GetNamespace(path.to_string()))?;
        Ok(self.namespaces.iter().find(|n| n.full_path == path).cloned())
    }

    fn create_project(&self, request: &CreateProject) -> Result<Project, ApiError> {
        self.record(Call::CreateProject(request.clone()))?;
        let parent = match request.namespace_id {
            Some(id) => self
                .namespaces
                .iter()
                .find(|n| n.id == id)
                .map(|n| n.full_path.clone())
                .ok_or(ApiError::Status {
                    status: 400,
                    message: "namespace is not valid".to_string(),
                })?,
            None => self.identity.username.clone(),
        };
        let path = format!("{}/{}", parent, request.path);
        let push_uri = self.init_remote(&path);
        Ok(self.insert(&path, "", push_uri))
    }

    fn unprotect_branch(&self, project_id: u64, branch: &str) -> Result<(), ApiError> {
        self.record(Call::Unprotect(project_id, branch.to_string()))?;
        match self.unprotect_status {
            Some(status) => Err(ApiError::Status {
                status,
                message: "500 Internal Server Error".to_string(),
            }),
            None => Ok(()),
        }
    }
}

pub fn ada() -> Identity {
    Identity {
        username: "ada".to_string(),
        name: "Ada Lovelace".to_string(),
        email: "ada@example.org".to_string(),
    }
}

/// Engine whose preferred strategy can never start.
pub fn cli_unavailable() -> Engine {
    Engine::new(
        Box::new(GitCli::with_program("/nonexistent/bin/git", false)),
        Box::new(InProcess),
    )
}

pub fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (path, content) in files {
        let full = dir.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }
}

/// Path -> content for every blob in the commit's tree.
pub fn tree_files(repo: &Repository, commit: Oid) -> BTreeMap<String, String> {
    let tree = repo.find_commit(commit).unwrap().tree().unwrap();
    let mut files = BTreeMap::new();
    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() == Some(ObjectType::Blob) {
            let blob = repo.find_blob(entry.id()).unwrap();
            files.insert(
                format!("{}{}", root, entry.name().unwrap()),
                String::from_utf8_lossy(blob.content()).into_owned(),
            );
        }
        TreeWalkResult::Ok
    })
    .unwrap();
    files
}

/// Number of commits reachable from `commit`.
pub fn history_len(repo: &Repository, commit: Oid) -> usize {
    let mut walk = repo.revwalk().unwrap();
    walk.push(commit).unwrap();
    walk.count()
}

/// Commit the bare remote's branch points at.
pub fn remote_branch(remote: &Path, branch: &str) -> Oid {
    let repo = Repository::open_bare(remote).unwrap();
    repo.refname_to_id(&format!("refs/heads/{}", branch)).unwrap()
}

/// HTTP server that answers every request with a Basic-auth challenge.
/// Returns its base URL and the request heads it has seen.
pub fn serve_unauthorized() -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => head.extend_from_slice(&buf[..n]),
                }
            }
            log.lock()
                .unwrap()
                .push(String::from_utf8_lossy(&head).into_owned());
            let _ = stream.write_all(
                b"HTTP/1.1 401 Unauthorized\r\n\
                  WWW-Authenticate: Basic realm=\"git\"\r\n\
                  Content-Length: 0\r\n\
                  Connection: close\r\n\r\n",
            );
        }
    });

    (url, seen)
}
