//! Cleanup planning: turn a manifest into an ordered list of actions.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::block::Markers;
use crate::capability::KeyKind;
use crate::consts::MARKER_COMMENT;
use crate::manifest::Manifest;

/// One cleanup step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Action {
  DeleteFile {
    path: PathBuf,
    description: String,
  },
  RemoveBlock {
    file: PathBuf,
    namespace: String,
    alias: String,
    /// Block text recorded at provisioning time.
    #[serde(skip)]
    recorded: Option<String>,
  },
  DeleteLocalCredential {
    fingerprint: String,
    contact: String,
  },
  /// Without an id the key is looked up by title, then by fingerprint.
  DeleteRemoteObject {
    kind: KeyKind,
    id: Option<String>,
    title: Option<String>,
    fingerprint: Option<String>,
  },
  DeleteManifest {
    path: PathBuf,
  },
}

impl Action {
  /// Local file and keystore deletions are confirmed one by one.
  pub fn needs_item_confirmation(&self) -> bool {
    matches!(self, Action::DeleteFile { .. } | Action::DeleteLocalCredential { .. })
  }

  pub fn is_remote(&self) -> bool {
    matches!(self, Action::DeleteRemoteObject { .. })
  }

  pub fn markers(namespace: &str, alias: &str) -> Markers {
    Markers::with_comment(MARKER_COMMENT, namespace, alias)
  }
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Action::DeleteFile { path, description } => write!(f, "delete {} {}", description, path.display()),
      Action::RemoveBlock {
        file, namespace, alias, ..
      } => write!(f, "remove block '{} {}' from {}", namespace, alias, file.display()),
      Action::DeleteLocalCredential { fingerprint, contact } => {
        write!(f, "delete signing key {} <{}>", fingerprint, contact)
      }
      Action::DeleteRemoteObject {
        kind,
        id,
        title,
        fingerprint,
      } => {
        write!(f, "delete remote {} key", kind)?;
        match (id, title, fingerprint) {
          (Some(id), _, _) => write!(f, " id {}", id),
          (None, Some(title), _) => write!(f, " titled '{}'", title),
          (None, None, Some(fp)) => write!(f, " with fingerprint {}", fp),
          (None, None, None) => Ok(()),
        }
      }
      Action::DeleteManifest { path } => write!(f, "delete manifest {}", path.display()),
    }
  }
}

/// Ordered cleanup actions for one manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupPlan {
  pub alias: String,
  pub actions: Vec<Action>,
}

impl CleanupPlan {
  pub fn len(&self) -> usize {
    self.actions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.actions.is_empty()
  }

  pub fn has_remote(&self) -> bool {
    self.actions.iter().any(Action::is_remote)
  }
}

/// Compute the cleanup plan for a manifest.
///
/// Order: per-identity config, include block, SSH block, SSH key files,
/// local signing key, remote SSH key, remote signing key, manifest last.
pub fn plan(manifest: &Manifest, manifest_path: &Path) -> CleanupPlan {
  let mut actions = Vec::new();

  if let Some(path) = &manifest.git.per_identity_config_path {
    actions.push(Action::DeleteFile {
      path: path.clone(),
      description: "identity config".to_string(),
    });
  }

  actions.push(Action::RemoveBlock {
    file: manifest.git.config_path.clone(),
    namespace: manifest.namespace.clone(),
    alias: manifest.alias.clone(),
    recorded: manifest.git.include_block.clone(),
  });
  actions.push(Action::RemoveBlock {
    file: manifest.ssh.config_path.clone(),
    namespace: manifest.namespace.clone(),
    alias: manifest.alias.clone(),
    recorded: manifest.ssh.config_block.clone(),
  });

  if let Some(path) = &manifest.ssh.key_path {
    actions.push(Action::DeleteFile {
      path: path.clone(),
      description: "ssh private key".to_string(),
    });
  }
  if let Some(path) = &manifest.ssh.public_key_path {
    actions.push(Action::DeleteFile {
      path: path.clone(),
      description: "ssh public key".to_string(),
    });
  }

  if manifest.signing.enabled
    && let Some(fingerprint) = &manifest.signing.fingerprint
  {
    actions.push(Action::DeleteLocalCredential {
      fingerprint: fingerprint.clone(),
      contact: manifest.identity_email.clone(),
    });
  }

  if manifest.ssh_remote_registered() {
    actions.push(Action::DeleteRemoteObject {
      kind: KeyKind::Ssh,
      id: manifest.ssh.remote_id.clone(),
      title: manifest.ssh.remote_title.clone(),
      fingerprint: None,
    });
  }
  if manifest.signing_remote_registered() {
    actions.push(Action::DeleteRemoteObject {
      kind: KeyKind::Signing,
      id: manifest.signing.remote_id.clone(),
      title: manifest.signing.remote_title.clone(),
      fingerprint: manifest.signing.fingerprint.clone(),
    });
  }

  actions.push(Action::DeleteManifest {
    path: manifest_path.to_path_buf(),
  });

  CleanupPlan {
    alias: manifest.alias.clone(),
    actions,
  }
}
