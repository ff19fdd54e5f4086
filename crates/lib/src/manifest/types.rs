//! Manifest types for gitid.
//!
//! The manifest is the durable record of everything a provisioning run
//! created. Deprovisioning reads nothing else.
//!
//! # Example
//!
//! ```json
//! {
//!   "version": 1,
//!   "namespace": "gitid-3fa9c2e1",
//!   "alias": "work",
//!   "workspace": "/home/user/src/work",
//!   "identityUser": "alice-work",
//!   "identityEmail": "alice@work.example",
//!   "ssh": { "keyPath": "...", "configBlock": "# gitid-3fa9c2e1 work begin\n...", "uploaded": false, ... },
//!   "git": { "configPath": "...", "includeBlock": "...", "perIdentityConfigPath": "..." },
//!   "signing": { "enabled": false, ... },
//!   "remoteAuth": { "loginPerformed": false, "userSwitched": false, "scopesVerified": false }
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_HOST, MANIFEST_VERSION};
use crate::identity::Identity;

fn default_host() -> String {
  DEFAULT_HOST.to_string()
}

/// Persisted snapshot of one provisioned identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
  pub version: u32,
  pub namespace: String,
  pub alias: String,
  pub workspace: PathBuf,
  pub identity_user: String,
  pub identity_email: String,
  #[serde(default = "default_host")]
  pub host: String,
  /// Unix seconds when provisioning finished.
  #[serde(default)]
  pub created_at: u64,
  pub ssh: SshSection,
  pub git: GitSection,
  #[serde(default)]
  pub signing: SigningSection,
  #[serde(default)]
  pub remote_auth: RemoteAuthSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshSection {
  #[serde(default)]
  pub key_path: Option<PathBuf>,
  #[serde(default)]
  pub public_key_path: Option<PathBuf>,
  pub config_path: PathBuf,
  #[serde(default)]
  pub config_block: Option<String>,
  #[serde(default)]
  pub created: bool,
  #[serde(default)]
  pub reused: bool,
  #[serde(default)]
  pub uploaded: bool,
  #[serde(default)]
  pub remote_title: Option<String>,
  #[serde(default)]
  pub remote_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSection {
  pub config_path: PathBuf,
  #[serde(default)]
  pub include_block: Option<String>,
  #[serde(default)]
  pub per_identity_config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningSection {
  #[serde(default)]
  pub enabled: bool,
  #[serde(default)]
  pub created: bool,
  #[serde(default)]
  pub fingerprint: Option<String>,
  #[serde(default)]
  pub comment: Option<String>,
  #[serde(default)]
  pub remote_title: Option<String>,
  #[serde(default)]
  pub remote_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteAuthSection {
  #[serde(default)]
  pub login_performed: bool,
  #[serde(default)]
  pub user_switched: bool,
  #[serde(default)]
  pub scopes_verified: bool,
}

/// An object registered on the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
  pub id: String,
  pub title: String,
}

/// SSH keypair produced during provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshArtifact {
  pub private_path: PathBuf,
  pub public_path: PathBuf,
  pub created: bool,
  pub reused: bool,
  pub remote: Option<RemoteObject>,
}

/// Signing key produced during provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningArtifact {
  pub fingerprint: String,
  pub comment: String,
  pub created: bool,
  pub remote: Option<RemoteObject>,
}

/// Managed blocks and files written into shared configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedBlocks {
  pub ssh_config: PathBuf,
  pub ssh_block: String,
  pub git_config: PathBuf,
  pub include_block: String,
  pub identity_config: PathBuf,
}

/// Orchestration flags recorded alongside the artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionFlags {
  pub login_performed: bool,
  pub user_switched: bool,
  pub scopes_verified: bool,
  pub created_at: u64,
}

impl Manifest {
  /// Assemble a manifest from the results of a provisioning run.
  pub fn build(
    identity: &Identity,
    host: &str,
    ssh: Option<&SshArtifact>,
    signing: Option<&SigningArtifact>,
    blocks: &ManagedBlocks,
    flags: &ProvisionFlags,
  ) -> Self {
    let ssh_remote = ssh.and_then(|s| s.remote.as_ref());
    let signing_remote = signing.and_then(|s| s.remote.as_ref());

    Self {
      version: MANIFEST_VERSION,
      namespace: identity.namespace.to_string(),
      alias: identity.alias.to_string(),
      workspace: identity.workspace.clone(),
      identity_user: identity.user.clone(),
      identity_email: identity.email.clone(),
      host: host.to_string(),
      created_at: flags.created_at,
      ssh: SshSection {
        key_path: ssh.map(|s| s.private_path.clone()),
        public_key_path: ssh.map(|s| s.public_path.clone()),
        config_path: blocks.ssh_config.clone(),
        config_block: Some(blocks.ssh_block.clone()),
        created: ssh.is_some_and(|s| s.created),
        reused: ssh.is_some_and(|s| s.reused),
        uploaded: ssh_remote.is_some(),
        remote_title: ssh_remote.map(|r| r.title.clone()),
        remote_id: ssh_remote.map(|r| r.id.clone()),
      },
      git: GitSection {
        config_path: blocks.git_config.clone(),
        include_block: Some(blocks.include_block.clone()),
        per_identity_config_path: Some(blocks.identity_config.clone()),
      },
      signing: SigningSection {
        enabled: signing.is_some(),
        created: signing.is_some_and(|s| s.created),
        fingerprint: signing.map(|s| s.fingerprint.clone()),
        comment: signing.map(|s| s.comment.clone()),
        remote_title: signing_remote.map(|r| r.title.clone()),
        remote_id: signing_remote.map(|r| r.id.clone()),
      },
      remote_auth: RemoteAuthSection {
        login_performed: flags.login_performed,
        user_switched: flags.user_switched,
        scopes_verified: flags.scopes_verified,
      },
    }
  }

  /// Whether the SSH key was registered remotely (by id or by title).
  pub fn ssh_remote_registered(&self) -> bool {
    self.ssh.uploaded || self.ssh.remote_id.is_some() || self.ssh.remote_title.is_some()
  }

  /// Whether the signing key was registered remotely.
  pub fn signing_remote_registered(&self) -> bool {
    self.signing.remote_id.is_some() || self.signing.remote_title.is_some()
  }
}
