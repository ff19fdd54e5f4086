//! Test utilities for gitid-lib.
//!
//! In-memory fakes of the capability interfaces. The SSH fake writes real
//! key files so file-level effects can be asserted; everything else lives
//! in `RefCell`s inspected by the tests.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::path::Path;

use crate::capability::{
  CapabilityError, DeleteOutcome, GitProtocol, KeyGen, KeyKind, RemoteHost, RemoteKey, SigningIdentity,
  SigningKeyInfo, SshKeyPair,
};
use crate::layout::public_key_path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeSigningKey {
  pub fingerprint: String,
  pub comment: String,
  pub email: String,
}

#[derive(Debug, Default)]
pub struct FakeKeyGen {
  pub generated: Cell<u32>,
  pub signing_keys: RefCell<Vec<FakeSigningKey>>,
  pub deleted: RefCell<Vec<String>>,
  pub fail_ssh: Cell<bool>,
}

impl FakeKeyGen {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_signing_key(self, fingerprint: &str, comment: &str, email: &str) -> Self {
    self.signing_keys.borrow_mut().push(FakeSigningKey {
      fingerprint: fingerprint.to_string(),
      comment: comment.to_string(),
      email: email.to_string(),
    });
    self
  }

  pub fn fingerprints(&self) -> Vec<String> {
    self.signing_keys.borrow().iter().map(|k| k.fingerprint.clone()).collect()
  }
}

impl KeyGen for FakeKeyGen {
  fn check_available(&self, _signing: bool) -> Result<(), CapabilityError> {
    Ok(())
  }

  async fn create_ssh_keypair(&self, path: &Path, comment: &str) -> Result<SshKeyPair, CapabilityError> {
    if self.fail_ssh.get() {
      return Err(CapabilityError::CommandFailed {
        cmd: "ssh-keygen".to_string(),
        code: Some(1),
        stderr: "simulated failure".to_string(),
      });
    }
    let n = self.generated.get() + 1;
    self.generated.set(n);

    let public_path = public_key_path(path);
    if path.exists() || public_path.exists() {
      // ssh-keygen would prompt before overwriting
      return Err(CapabilityError::CommandFailed {
        cmd: "ssh-keygen".to_string(),
        code: Some(1),
        stderr: format!("{} already exists", path.display()),
      });
    }
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("PRIVATE KEY {}\n", n))?;
    std::fs::write(&public_path, format!("ssh-ed25519 AAAAfake{} {}\n", n, comment))?;

    Ok(SshKeyPair {
      private_path: path.to_path_buf(),
      public_path,
    })
  }

  async fn create_signing_keypair(
    &self,
    identity: &SigningIdentity<'_>,
    comment: &str,
  ) -> Result<String, CapabilityError> {
    let n = self.generated.get() + 1;
    self.generated.set(n);
    let fingerprint = format!("FAKEFPR{:033}", n);
    self.signing_keys.borrow_mut().push(FakeSigningKey {
      fingerprint: fingerprint.clone(),
      comment: comment.to_string(),
      email: identity.email.to_string(),
    });
    Ok(fingerprint)
  }

  async fn delete_keypair_by_fingerprint(&self, fingerprint: &str) -> Result<(), CapabilityError> {
    self.deleted.borrow_mut().push(fingerprint.to_string());
    self.signing_keys.borrow_mut().retain(|k| k.fingerprint != fingerprint);
    Ok(())
  }

  async fn list_by_contact(&self, contact: &str) -> Result<Vec<SigningKeyInfo>, CapabilityError> {
    Ok(
      self
        .signing_keys
        .borrow()
        .iter()
        .filter(|k| k.email == contact)
        .map(|k| SigningKeyInfo {
          fingerprint: k.fingerprint.clone(),
          comment: Some(k.comment.clone()),
        })
        .collect(),
    )
  }

  async fn export_public(&self, fingerprint: &str) -> Result<String, CapabilityError> {
    Ok(format!(
      "-----BEGIN PGP PUBLIC KEY BLOCK-----\n{}\n-----END PGP PUBLIC KEY BLOCK-----\n",
      fingerprint
    ))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRemoteKey {
  pub kind: KeyKind,
  pub id: String,
  pub title: String,
  pub material: String,
}

#[derive(Debug)]
pub struct FakeRemote {
  pub scopes: RefCell<BTreeSet<String>>,
  pub keys: RefCell<Vec<FakeRemoteKey>>,
  pub logins: RefCell<Vec<String>>,
  pub switched_to: RefCell<Vec<String>>,
  pub probe_code: Cell<i32>,
  pub probes: Cell<u32>,
  pub fail_auth: Cell<bool>,
  pub fail_delete: Cell<bool>,
  next_id: Cell<u64>,
}

impl Default for FakeRemote {
  fn default() -> Self {
    Self {
      scopes: RefCell::new(
        ["admin:public_key", "admin:gpg_key", "repo"]
          .into_iter()
          .map(str::to_string)
          .collect(),
      ),
      keys: RefCell::new(Vec::new()),
      logins: RefCell::new(Vec::new()),
      switched_to: RefCell::new(Vec::new()),
      probe_code: Cell::new(1),
      probes: Cell::new(0),
      fail_auth: Cell::new(false),
      fail_delete: Cell::new(false),
      next_id: Cell::new(100),
    }
  }
}

impl FakeRemote {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_scopes(self, scopes: &[&str]) -> Self {
    *self.scopes.borrow_mut() = scopes.iter().map(|s| s.to_string()).collect();
    self
  }

  pub fn keys_of(&self, kind: KeyKind) -> Vec<FakeRemoteKey> {
    self.keys.borrow().iter().filter(|k| k.kind == kind).cloned().collect()
  }
}

impl RemoteHost for FakeRemote {
  fn check_available(&self) -> Result<(), CapabilityError> {
    Ok(())
  }

  async fn authenticate(&self, token: &str, _protocol: GitProtocol) -> Result<(), CapabilityError> {
    if self.fail_auth.get() {
      return Err(CapabilityError::CommandFailed {
        cmd: "gh auth login".to_string(),
        code: Some(1),
        stderr: "bad credentials".to_string(),
      });
    }
    self.logins.borrow_mut().push(token.to_string());
    Ok(())
  }

  async fn switch_active_user(&self, user: &str) -> Result<(), CapabilityError> {
    self.switched_to.borrow_mut().push(user.to_string());
    Ok(())
  }

  async fn current_scopes(&self) -> Result<BTreeSet<String>, CapabilityError> {
    Ok(self.scopes.borrow().clone())
  }

  async fn upload_public_key(&self, kind: KeyKind, material: &str, title: &str) -> Result<String, CapabilityError> {
    let id = self.next_id.get();
    self.next_id.set(id + 1);
    self.keys.borrow_mut().push(FakeRemoteKey {
      kind,
      id: id.to_string(),
      title: title.to_string(),
      material: material.to_string(),
    });
    Ok(id.to_string())
  }

  async fn list_keys(&self, kind: KeyKind) -> Result<Vec<RemoteKey>, CapabilityError> {
    Ok(
      self
        .keys_of(kind)
        .into_iter()
        .map(|k| RemoteKey {
          id: k.id,
          title: Some(k.title),
          fingerprint: None,
        })
        .collect(),
    )
  }

  async fn delete_key(&self, kind: KeyKind, id: &str) -> Result<DeleteOutcome, CapabilityError> {
    if self.fail_delete.get() {
      return Err(CapabilityError::CommandFailed {
        cmd: "gh api -X DELETE".to_string(),
        code: Some(1),
        stderr: "HTTP 401: Bad credentials".to_string(),
      });
    }
    let mut keys = self.keys.borrow_mut();
    let before = keys.len();
    keys.retain(|k| !(k.kind == kind && k.id == id));
    Ok(if keys.len() < before {
      DeleteOutcome::Deleted
    } else {
      DeleteOutcome::NotFound
    })
  }

  async fn probe_connectivity(&self, _alias: &str) -> Result<i32, CapabilityError> {
    self.probes.set(self.probes.get() + 1);
    Ok(self.probe_code.get())
  }
}
