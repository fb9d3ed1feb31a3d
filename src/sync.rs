//! Provision → snapshot → publish.

use chrono::Utc;

use crate::config::SyncConfig;
use crate::credential::Token;
use crate::error::SyncError;
use crate::events::{EventSink, RecordingSink};
use crate::forge::HostingApi;
use crate::git::publish::publish;
use crate::git::snapshot::{self, SnapshotRequest};
use crate::git::{Engine, Operation, PushOutcome};
use crate::provision::provision;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub project: String,
    pub push_uri: String,
    pub created: bool,
    pub branch: String,
    pub commit: String,
    pub push: PushOutcome,
    /// Operations that ran on the fallback strategy.
    pub fallbacks: Vec<Operation>,
}

/// Upload `config.folder` to `config.destination` as a single fresh commit.
///
/// Stops at the first failure. A failed push leaves the local commit in
/// place; running again rebuilds it anyway.
pub fn run(
    config: &SyncConfig,
    token: &Token,
    api: &dyn HostingApi,
    engine: &Engine,
    sink: &dyn EventSink,
) -> Result<SyncReport, SyncError> {
    let recorder = RecordingSink::forwarding(sink);

    let provisioned = provision(api, token, config, &recorder)?;
    let branch = provisioned.branch(&config.branch).to_string();

    let request = SnapshotRequest {
        folder: &config.folder,
        message: &config.commit_message,
        identity: &provisioned.identity,
        branch: &branch,
        when: Utc::now(),
    };
    let snapshot = snapshot::build(&request, engine, &recorder)?;

    let outcome = publish(
        &snapshot,
        provisioned.push_uri(),
        &provisioned.identity,
        provisioned.token,
        engine,
        &recorder,
    )?;

    Ok(SyncReport {
        project: provisioned.project.path_with_namespace.clone(),
        push_uri: provisioned.project.push_uri.clone(),
        created: provisioned.created,
        branch,
        commit: snapshot.commit.to_string(),
        push: outcome,
        fallbacks: recorder.fallbacks(),
    })
}
