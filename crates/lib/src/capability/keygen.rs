//! `ssh-keygen` and `gpg` backed key generation.

use std::path::Path;

use tracing::{debug, info};

use crate::layout::public_key_path;

use super::process::{display_cmd, run, run_checked};
use super::{CapabilityError, KeyGen, SigningIdentity, SigningKeyInfo, SshKeyPair};

const SSH_KEYGEN: &str = "ssh-keygen";
const GPG: &str = "gpg";

/// Key generation using the system's OpenSSH and GnuPG installations.
#[derive(Debug, Clone, Default)]
pub struct SystemKeyGen;

impl SystemKeyGen {
  pub fn new() -> Self {
    Self
  }
}

fn require(tool: &str) -> Result<(), CapabilityError> {
  which::which(tool)
    .map(|_| ())
    .map_err(|_| CapabilityError::MissingTool(tool.to_string()))
}

impl KeyGen for SystemKeyGen {
  fn check_available(&self, signing: bool) -> Result<(), CapabilityError> {
    require(SSH_KEYGEN)?;
    if signing {
      require(GPG)?;
    }
    Ok(())
  }

  async fn create_ssh_keypair(&self, path: &Path, comment: &str) -> Result<SshKeyPair, CapabilityError> {
    let path_str = path.to_string_lossy().into_owned();
    info!(path = %path.display(), "generating ssh keypair");
    run_checked(
      SSH_KEYGEN,
      &["-t", "ed25519", "-N", "", "-C", comment, "-f", path_str.as_str(), "-q"],
      None,
    )
    .await?;

    Ok(SshKeyPair {
      private_path: path.to_path_buf(),
      public_path: public_key_path(path),
    })
  }

  async fn create_signing_keypair(
    &self,
    identity: &SigningIdentity<'_>,
    comment: &str,
  ) -> Result<String, CapabilityError> {
    let user_id = format!("{} ({}) <{}>", identity.name, comment, identity.email);
    info!(user_id = %user_id, "generating signing key");
    run_checked(
      GPG,
      &[
        "--batch",
        "--pinentry-mode",
        "loopback",
        "--passphrase",
        "",
        "--quick-gen-key",
        user_id.as_str(),
        "ed25519",
        "sign",
        "never",
      ],
      None,
    )
    .await?;

    self
      .list_by_contact(identity.email)
      .await?
      .into_iter()
      .rev()
      .find(|key| key.comment.as_deref() == Some(comment))
      .map(|key| key.fingerprint)
      .ok_or_else(|| CapabilityError::Parse {
        cmd: "gpg --quick-gen-key".to_string(),
        message: format!("generated key for '{}' not found in keyring", user_id),
      })
  }

  async fn delete_keypair_by_fingerprint(&self, fingerprint: &str) -> Result<(), CapabilityError> {
    info!(fingerprint = %fingerprint, "deleting signing key");
    run_checked(
      GPG,
      &["--batch", "--yes", "--delete-secret-and-public-key", fingerprint],
      None,
    )
    .await?;
    Ok(())
  }

  async fn list_by_contact(&self, contact: &str) -> Result<Vec<SigningKeyInfo>, CapabilityError> {
    let args = ["--batch", "--with-colons", "--fingerprint", "--list-secret-keys", contact];
    let output = run(GPG, &args, None).await?;

    // gpg exits non-zero when nothing matches
    if !output.success() && !output.stdout.lines().any(|l| l.starts_with("sec:")) {
      debug!(contact = %contact, "no signing keys for contact");
      return Ok(Vec::new());
    }
    if !output.success() {
      return Err(CapabilityError::CommandFailed {
        cmd: display_cmd(GPG, &args),
        code: output.code,
        stderr: output.stderr.trim().to_string(),
      });
    }

    Ok(parse_colon_listing(&output.stdout))
  }

  async fn export_public(&self, fingerprint: &str) -> Result<String, CapabilityError> {
    let armored = run_checked(GPG, &["--armor", "--export", fingerprint], None).await?;
    if armored.trim().is_empty() {
      return Err(CapabilityError::Parse {
        cmd: "gpg --export".to_string(),
        message: format!("no public key exported for {}", fingerprint),
      });
    }
    Ok(armored)
  }
}

/// Parse `gpg --with-colons` secret key listings.
fn parse_colon_listing(stdout: &str) -> Vec<SigningKeyInfo> {
  let mut keys: Vec<SigningKeyInfo> = Vec::new();
  // fingerprint and first uid still pending for the current key
  let mut want_fpr = false;
  let mut want_uid = false;

  for line in stdout.lines() {
    let fields: Vec<&str> = line.split(':').collect();
    match fields.first().copied() {
      Some("sec") => {
        want_fpr = true;
        want_uid = true;
      }
      Some("ssb") => want_fpr = false,
      Some("fpr") if want_fpr => {
        if let Some(fpr) = fields.get(9).filter(|f| !f.is_empty()) {
          keys.push(SigningKeyInfo {
            fingerprint: fpr.to_string(),
            comment: None,
          });
        }
        want_fpr = false;
      }
      Some("uid") if want_uid => {
        if let (Some(key), Some(user_id)) = (keys.last_mut(), fields.get(9)) {
          key.comment = user_id_comment(&user_id.replace("\\x3a", ":"));
        }
        want_uid = false;
      }
      _ => {}
    }
  }

  keys
}

/// Extract `comment` from `Name (comment) <email>`.
fn user_id_comment(user_id: &str) -> Option<String> {
  let without_email = match user_id.rfind(" <") {
    Some(i) => &user_id[..i],
    None => user_id,
  };
  let inner = without_email.strip_suffix(')')?;
  let open = inner.rfind('(')?;
  Some(inner[open + 1..].to_string())
}
