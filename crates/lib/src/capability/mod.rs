//! Capability interfaces: the external systems the core drives.
//!
//! - [`KeyGen`]: local credential generation and the signing keystore
//! - [`RemoteHost`]: authentication and key registration on the remote host
//!
//! Process-backed implementations live in [`keygen`] and [`remote`].

pub mod keygen;
pub mod process;
pub mod remote;

use std::collections::BTreeSet;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use keygen::SystemKeyGen;
pub use remote::GhRemote;

#[derive(Debug, Error)]
pub enum CapabilityError {
  /// A required executable is not installed.
  #[error("required tool '{0}' not found on PATH")]
  MissingTool(String),

  #[error("`{cmd}` failed with exit code {code:?}: {stderr}")]
  CommandFailed {
    cmd: String,
    code: Option<i32>,
    stderr: String,
  },

  #[error("failed to run `{cmd}`: {source}")]
  Spawn {
    cmd: String,
    #[source]
    source: io::Error,
  },

  #[error("unexpected output from {cmd}: {message}")]
  Parse { cmd: String, message: String },

  #[error("io error: {0}")]
  Io(#[from] io::Error),
}

/// Kind of public key registered on the remote host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
  Ssh,
  Signing,
}

impl fmt::Display for KeyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      KeyKind::Ssh => f.write_str("ssh"),
      KeyKind::Signing => f.write_str("signing"),
    }
  }
}

/// Git transport configured when authenticating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitProtocol {
  Ssh,
}

impl GitProtocol {
  pub fn as_str(&self) -> &'static str {
    match self {
      GitProtocol::Ssh => "ssh",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKeyPair {
  pub private_path: PathBuf,
  pub public_path: PathBuf,
}

/// Name and address placed in a signing key's user id.
#[derive(Debug, Clone, Copy)]
pub struct SigningIdentity<'a> {
  pub name: &'a str,
  pub email: &'a str,
}

/// A signing key present in the local keystore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningKeyInfo {
  pub fingerprint: String,
  /// The parenthesized comment of the key's first user id.
  pub comment: Option<String>,
}

/// A key registered on the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteKey {
  pub id: String,
  pub title: Option<String>,
  /// Key id or fingerprint, when the host reports one.
  pub fingerprint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
  Deleted,
  NotFound,
}

/// Local credential generation and keystore access.
#[allow(async_fn_in_trait)]
pub trait KeyGen {
  /// Fail fast when the tools backing this capability are missing.
  fn check_available(&self, signing: bool) -> Result<(), CapabilityError>;

  async fn create_ssh_keypair(&self, path: &Path, comment: &str) -> Result<SshKeyPair, CapabilityError>;

  /// Create a signing key and return its fingerprint.
  async fn create_signing_keypair(
    &self,
    identity: &SigningIdentity<'_>,
    comment: &str,
  ) -> Result<String, CapabilityError>;

  async fn delete_keypair_by_fingerprint(&self, fingerprint: &str) -> Result<(), CapabilityError>;

  async fn list_by_contact(&self, contact: &str) -> Result<Vec<SigningKeyInfo>, CapabilityError>;

  /// ASCII-armored public half of a signing key.
  async fn export_public(&self, fingerprint: &str) -> Result<String, CapabilityError>;
}

/// The remote host's account and key API.
#[allow(async_fn_in_trait)]
pub trait RemoteHost {
  fn check_available(&self) -> Result<(), CapabilityError>;

  async fn authenticate(&self, token: &str, protocol: GitProtocol) -> Result<(), CapabilityError>;

  async fn switch_active_user(&self, user: &str) -> Result<(), CapabilityError>;

  /// Permission scopes granted to the active credential.
  async fn current_scopes(&self) -> Result<BTreeSet<String>, CapabilityError>;

  /// Register a public key and return its remote id.
  async fn upload_public_key(&self, kind: KeyKind, material: &str, title: &str) -> Result<String, CapabilityError>;

  async fn list_keys(&self, kind: KeyKind) -> Result<Vec<RemoteKey>, CapabilityError>;

  async fn delete_key(&self, kind: KeyKind, id: &str) -> Result<DeleteOutcome, CapabilityError>;

  /// Attempt a non-interactive session through the SSH alias; returns the exit code.
  async fn probe_connectivity(&self, alias: &str) -> Result<i32, CapabilityError>;
}
