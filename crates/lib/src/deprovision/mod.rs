//! Deprovisioning: roll back everything a manifest records.
//!
//! Resolution fails closed: a missing explicit manifest or a corrupt one is an
//! error. Execution fails open: each action is best-effort and a miss is
//! reported in its outcome rather than aborting the run. The manifest is
//! deleted last so an interrupted run can be resumed.

pub mod plan;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::block::{self, RemovalMethod};
use crate::capability::{DeleteOutcome, KeyGen, KeyKind, RemoteHost, RemoteKey};
use crate::identity::{Alias, IdentityError, Namespace};
use crate::layout::Layout;
use crate::manifest::{self, Manifest, ManifestError};

pub use plan::{Action, CleanupPlan, plan};

#[derive(Debug, Error)]
pub enum DeprovisionError {
  #[error(transparent)]
  Identity(#[from] IdentityError),

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error("confirmation failed: {0}")]
  Confirm(#[source] io::Error),
}

/// Where to find the manifest to roll back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
  /// Derive the state path from an alias (case-insensitive).
  Alias(String),
  /// Use an explicit manifest file.
  Path(PathBuf),
}

#[derive(Debug)]
pub enum Resolution {
  Found { manifest: Manifest, path: PathBuf },
  /// No manifest under the alias's state directory.
  NothingToDo { path: PathBuf },
}

/// Locate and load the manifest for `source`.
pub fn resolve(source: &ManifestSource, layout: &Layout) -> Result<Resolution, DeprovisionError> {
  match source {
    ManifestSource::Path(path) => {
      let manifest = manifest::load(path)?;
      Ok(Resolution::Found {
        manifest,
        path: path.clone(),
      })
    }
    ManifestSource::Alias(raw) => {
      let alias = Alias::parse(raw)?;
      let path = layout.manifest_path(&Namespace::derive(&alias));
      match manifest::load(&path) {
        Ok(manifest) => Ok(Resolution::Found { manifest, path }),
        Err(ManifestError::NotFound(path)) => {
          info!(alias = %alias, path = %path.display(), "no manifest for alias");
          Ok(Resolution::NothingToDo { path })
        }
        Err(e) => Err(e.into()),
      }
    }
  }
}

/// Yes/no prompts shown during cleanup.
pub trait Confirm {
  fn confirm(&self, message: &str) -> io::Result<bool>;
}

/// Answers yes to every prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
  fn confirm(&self, _message: &str) -> io::Result<bool> {
    Ok(true)
  }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeprovisionOptions {
  /// Compute the plan and stop.
  pub dry_run: bool,
  /// Skip every prompt.
  pub assume_yes: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "camelCase")]
pub enum ActionOutcome {
  Done,
  AlreadyAbsent,
  Skipped(String),
  Declined,
  Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionResult {
  pub action: Action,
  pub outcome: ActionOutcome,
}

/// What a cleanup run did.
#[derive(Debug, Clone, Serialize)]
pub struct DeprovisionReport {
  pub plan: CleanupPlan,
  pub results: Vec<ActionResult>,
  pub dry_run: bool,
  /// The batch confirmation was declined; nothing was touched.
  pub aborted: bool,
}

impl DeprovisionReport {
  fn count(&self, f: impl Fn(&ActionOutcome) -> bool) -> usize {
    self.results.iter().filter(|r| f(&r.outcome)).count()
  }

  pub fn done(&self) -> usize {
    self.count(|o| matches!(o, ActionOutcome::Done))
  }

  pub fn already_absent(&self) -> usize {
    self.count(|o| matches!(o, ActionOutcome::AlreadyAbsent))
  }

  pub fn skipped(&self) -> usize {
    self.count(|o| matches!(o, ActionOutcome::Skipped(_)))
  }

  pub fn declined(&self) -> usize {
    self.count(|o| matches!(o, ActionOutcome::Declined))
  }

  pub fn failed(&self) -> usize {
    self.count(|o| matches!(o, ActionOutcome::Failed(_)))
  }

  /// Whether the manifest is still on disk after the run.
  pub fn manifest_kept(&self) -> bool {
    !self.results.iter().any(|r| {
      matches!(r.action, Action::DeleteManifest { .. })
        && matches!(r.outcome, ActionOutcome::Done | ActionOutcome::AlreadyAbsent)
    })
  }
}

/// Execute a cleanup plan.
///
/// Unless `assume_yes` is set, the whole plan is confirmed once up front and
/// each local file or keystore deletion is confirmed again individually.
/// The manifest survives any declined or failed action.
pub async fn execute<K: KeyGen, R: RemoteHost, C: Confirm>(
  manifest: &Manifest,
  plan: CleanupPlan,
  options: DeprovisionOptions,
  keygen: &K,
  remote: &R,
  confirm: &C,
) -> Result<DeprovisionReport, DeprovisionError> {
  let mut report = DeprovisionReport {
    plan,
    results: Vec::new(),
    dry_run: options.dry_run,
    aborted: false,
  };

  if options.dry_run {
    info!(alias = %manifest.alias, actions = report.plan.len(), "dry run, nothing changed");
    return Ok(report);
  }

  let ask = |message: &str| -> Result<bool, DeprovisionError> {
    if options.assume_yes {
      return Ok(true);
    }
    confirm.confirm(message).map_err(DeprovisionError::Confirm)
  };

  let gate = format!(
    "Remove {} item(s) provisioned for '{}'?",
    report.plan.len(),
    manifest.alias
  );
  if !ask(&gate)? {
    info!(alias = %manifest.alias, "cleanup declined");
    report.aborted = true;
    return Ok(report);
  }

  if manifest.remote_auth.user_switched && report.plan.has_remote() {
    if let Err(e) = remote.switch_active_user(&manifest.identity_user).await {
      warn!(user = %manifest.identity_user, error = %e, "could not switch remote user");
    }
  }

  // local deletions get a second, per-item prompt
  let approve = |action: &Action| -> Result<bool, DeprovisionError> {
    if !action.needs_item_confirmation() {
      return Ok(true);
    }
    ask(&format!("{}?", action))
  };

  let actions = report.plan.actions.clone();
  for action in actions {
    let outcome = match &action {
      Action::DeleteFile { path, .. } => {
        if !path.exists() {
          ActionOutcome::AlreadyAbsent
        } else if !approve(&action)? {
          ActionOutcome::Declined
        } else {
          delete_file(path)
        }
      }
      Action::RemoveBlock {
        file,
        namespace,
        alias,
        recorded,
      } => remove_block(file, namespace, alias, recorded.as_deref()),
      Action::DeleteLocalCredential { fingerprint, contact } => {
        match local_credential_present(keygen, fingerprint, contact).await {
          Err(reason) => ActionOutcome::Failed(reason),
          Ok(false) => ActionOutcome::AlreadyAbsent,
          Ok(true) => {
            if !approve(&action)? {
              ActionOutcome::Declined
            } else {
              match keygen.delete_keypair_by_fingerprint(fingerprint).await {
                Ok(()) => ActionOutcome::Done,
                Err(e) => ActionOutcome::Failed(e.to_string()),
              }
            }
          }
        }
      }
      Action::DeleteRemoteObject {
        kind,
        id,
        title,
        fingerprint,
      } => delete_remote(remote, *kind, id.as_deref(), title.as_deref(), fingerprint.as_deref()).await,
      Action::DeleteManifest { path } => {
        // the manifest is the only record of what remains
        if report.declined() + report.failed() > 0 {
          ActionOutcome::Skipped("kept because some items were declined or failed".to_string())
        } else {
          match manifest::delete(path) {
            Ok(true) => ActionOutcome::Done,
            Ok(false) => ActionOutcome::AlreadyAbsent,
            Err(e) => ActionOutcome::Failed(e.to_string()),
          }
        }
      }
    };

    match &outcome {
      ActionOutcome::Done => info!(action = %action, "done"),
      ActionOutcome::AlreadyAbsent => info!(action = %action, "already absent"),
      ActionOutcome::Declined => info!(action = %action, "declined"),
      ActionOutcome::Skipped(reason) => warn!(action = %action, reason = %reason, "skipped"),
      ActionOutcome::Failed(reason) => warn!(action = %action, reason = %reason, "failed"),
    }
    report.results.push(ActionResult { action, outcome });
  }

  info!(
    alias = %manifest.alias,
    done = report.done(),
    absent = report.already_absent(),
    skipped = report.skipped(),
    declined = report.declined(),
    failed = report.failed(),
    "cleanup complete"
  );
  Ok(report)
}

fn delete_file(path: &Path) -> ActionOutcome {
  match fs::remove_file(path) {
    Ok(()) => ActionOutcome::Done,
    Err(e) if e.kind() == io::ErrorKind::NotFound => ActionOutcome::AlreadyAbsent,
    Err(e) => ActionOutcome::Failed(e.to_string()),
  }
}

fn remove_block(file: &Path, namespace: &str, alias: &str, recorded: Option<&str>) -> ActionOutcome {
  let markers = Action::markers(namespace, alias);
  match block::remove_from_file(file, recorded, &markers) {
    Ok(RemovalMethod::Absent) => ActionOutcome::AlreadyAbsent,
    Ok(RemovalMethod::Exact) => ActionOutcome::Done,
    Ok(RemovalMethod::Markers) => {
      info!(path = %file.display(), "recorded block was edited, removed by markers");
      ActionOutcome::Done
    }
    Err(e) => ActionOutcome::Failed(e.to_string()),
  }
}

async fn local_credential_present<K: KeyGen>(keygen: &K, fingerprint: &str, contact: &str) -> Result<bool, String> {
  let keys = keygen.list_by_contact(contact).await.map_err(|e| e.to_string())?;
  Ok(keys.iter().any(|k| k.fingerprint.eq_ignore_ascii_case(fingerprint)))
}

/// Match a listed remote key by title, or by fingerprint suffix (hosts often
/// report only the long key id).
fn matches_remote(key: &RemoteKey, title: Option<&str>, fingerprint: Option<&str>) -> bool {
  let by_title = matches!((key.title.as_deref(), title), (Some(a), Some(b)) if a == b);
  let by_fingerprint = match (key.fingerprint.as_deref(), fingerprint) {
    (Some(listed), Some(recorded)) if !listed.is_empty() => recorded
      .to_ascii_uppercase()
      .ends_with(&listed.to_ascii_uppercase()),
    _ => false,
  };
  by_title || by_fingerprint
}

async fn delete_remote<R: RemoteHost>(
  remote: &R,
  kind: KeyKind,
  id: Option<&str>,
  title: Option<&str>,
  fingerprint: Option<&str>,
) -> ActionOutcome {
  let id = match id {
    Some(id) => id.to_string(),
    None => {
      let keys = match remote.list_keys(kind).await {
        Ok(keys) => keys,
        Err(e) => return ActionOutcome::Failed(e.to_string()),
      };
      match keys.into_iter().find(|k| matches_remote(k, title, fingerprint)) {
        Some(key) => key.id,
        None => return ActionOutcome::Skipped(format!("no remote {} key matches the recorded title or fingerprint", kind)),
      }
    }
  };

  match remote.delete_key(kind, &id).await {
    Ok(DeleteOutcome::Deleted) => ActionOutcome::Done,
    Ok(DeleteOutcome::NotFound) => ActionOutcome::AlreadyAbsent,
    Err(e) => ActionOutcome::Failed(e.to_string()),
  }
}
