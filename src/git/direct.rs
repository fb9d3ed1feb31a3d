//! In-process strategy backed by libgit2.

use git2::{
    Cred, Index, IndexEntry, IndexTime, PushOptions, RemoteCallbacks, Repository, Signature, Time,
};
use std::cell::{Cell, RefCell};
use std::path::Path;
use walkdir::WalkDir;

use super::{CommitSpec, GitError, PushOutcome, PushSpec, Strategy, REMOTE_NAME};

const GITLINK_MODE: u32 = 0o160000;

/// Runs git operations through libgit2. Always available.
///
/// Staging walks the tree and adds every non-directory entry outside any
/// `.git`, one by one; ignore files are not consulted. Nested repositories
/// become gitlinks.
#[derive(Debug, Default, Clone, Copy)]
pub struct InProcess;

impl Strategy for InProcess {
    fn name(&self) -> &'static str {
        "in-process"
    }

    fn stage_all(&self, repo: &Repository) -> Result<(), GitError> {
        let workdir = repo.workdir().ok_or(GitError::NoWorkdir)?;
        let mut index = repo.index()?;

        let mut walker = WalkDir::new(workdir)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git");

        while let Some(entry) = walker.next() {
            let entry = entry.map_err(std::io::Error::from)?;
            let Ok(relative) = entry.path().strip_prefix(workdir) else {
                continue;
            };

            if entry.file_type().is_dir() {
                if entry.path().join(".git").exists() {
                    walker.skip_current_dir();
                    add_gitlink(&mut index, entry.path(), relative)?;
                }
                continue;
            }

            tracing::trace!(path = %relative.display(), "adding");
            index.add_path(relative)?;
        }

        index.write()?;
        Ok(())
    }

    fn commit(&self, repo: &Repository, commit: &CommitSpec<'_>) -> Result<(), GitError> {
        let mut index = repo.index()?;
        // Pick up anything staged on disk by another process.
        index.read(false)?;
        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;

        let time = Time::new(commit.when.timestamp(), 0);
        let signature = Signature::new(commit.name, commit.email, &time)?;

        let oid = repo.commit(
            Some("HEAD"),
            &signature,
            &signature,
            commit.message,
            &tree,
            &[],
        )?;
        tracing::debug!(%oid, "created commit");
        Ok(())
    }

    fn push(&self, repo: &Repository, push: &PushSpec<'_>) -> Result<PushOutcome, GitError> {
        let mut remote = repo.find_remote(REMOTE_NAME)?;

        let offered = Cell::new(false);
        let up_to_date = Cell::new(false);
        let rejection: RefCell<Option<(String, String)>> = RefCell::new(None);
        let refspec = push.refspec();

        {
            let mut callbacks = RemoteCallbacks::new();
            callbacks.credentials(|_url, _username_from_url, allowed| {
                // libgit2 keeps asking while the server rejects; answer once.
                if offered.replace(true) {
                    return Err(git2::Error::from_str("credentials rejected by remote"));
                }
                if allowed.is_user_pass_plaintext() {
                    Cred::userpass_plaintext(push.username, push.token.expose())
                } else {
                    Cred::default()
                }
            });
            callbacks.push_negotiation(|updates| {
                up_to_date.set(updates.iter().all(|update| update.src() == update.dst()));
                Ok(())
            });
            callbacks.push_update_reference(|reference, status| {
                if let Some(message) = status {
                    *rejection.borrow_mut() = Some((reference.to_string(), message.to_string()));
                }
                Ok(())
            });

            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);
            remote.push(&[refspec.as_str()], Some(&mut options))?;
        }

        if let Some((reference, message)) = rejection.into_inner() {
            return Err(GitError::Rejected { reference, message });
        }

        if up_to_date.get() {
            Ok(PushOutcome::UpToDate)
        } else {
            Ok(PushOutcome::Updated)
        }
    }
}

/// Record a nested repository as a gitlink to its checked-out commit, the
/// way `git add` does. One without a commit is left out.
fn add_gitlink(index: &mut Index, nested: &Path, relative: &Path) -> Result<(), GitError> {
    let head = Repository::open(nested)
        .ok()
        .and_then(|repo| repo.head().ok().and_then(|head| head.target()));
    let Some(id) = head else {
        tracing::debug!(path = %relative.display(), "skipping nested repository without a commit");
        return Ok(());
    };

    let path = relative
        .components()
        .map(|part| part.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
    tracing::trace!(path = %path, %id, "adding gitlink");

    index.add(&IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: GITLINK_MODE,
        uid: 0,
        gid: 0,
        file_size: 0,
        id,
        flags: 0,
        flags_extended: 0,
        path: path.into_bytes(),
    })?;
    Ok(())
}
