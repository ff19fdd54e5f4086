//! GitHub remote host backed by the `gh` CLI.
//!
//! Key CRUD goes through `gh api` so results come back as JSON with ids.
//! The connectivity probe uses `ssh` against the configured host alias.

use std::collections::BTreeSet;

use serde::Deserialize;
use tracing::{debug, info};

use super::process::{display_cmd, run, run_checked};
use super::{CapabilityError, DeleteOutcome, GitProtocol, KeyKind, RemoteHost, RemoteKey};

const GH: &str = "gh";
const SSH: &str = "ssh";

/// `gh` CLI client bound to one host.
#[derive(Debug, Clone)]
pub struct GhRemote {
  host: String,
}

#[derive(Debug, Deserialize)]
struct SshKeyResponse {
  id: u64,
  #[serde(default)]
  title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GpgKeyResponse {
  id: u64,
  #[serde(default)]
  name: Option<String>,
  #[serde(default)]
  key_id: Option<String>,
}

impl GhRemote {
  pub fn new(host: impl Into<String>) -> Self {
    Self { host: host.into() }
  }

  fn endpoint(kind: KeyKind) -> &'static str {
    match kind {
      KeyKind::Ssh => "user/keys",
      KeyKind::Signing => "user/gpg_keys",
    }
  }

  async fn api(&self, args: &[&str]) -> Result<String, CapabilityError> {
    let mut full = vec!["api", "--hostname", self.host.as_str()];
    full.extend_from_slice(args);
    run_checked(GH, &full, None).await
  }
}

fn parse_json<T: for<'de> Deserialize<'de>>(cmd: &str, body: &str) -> Result<T, CapabilityError> {
  serde_json::from_str(body).map_err(|e| CapabilityError::Parse {
    cmd: cmd.to_string(),
    message: e.to_string(),
  })
}

/// Extract scopes from the `X-Oauth-Scopes` response header.
fn parse_scopes(response: &str) -> Option<BTreeSet<String>> {
  response
    .lines()
    .take_while(|line| !line.trim().is_empty())
    .find_map(|line| {
      let (name, value) = line.split_once(':')?;
      name.trim().eq_ignore_ascii_case("x-oauth-scopes").then(|| {
        value
          .split(',')
          .map(str::trim)
          .filter(|s| !s.is_empty())
          .map(str::to_string)
          .collect()
      })
    })
}

impl RemoteHost for GhRemote {
  fn check_available(&self) -> Result<(), CapabilityError> {
    which::which(GH)
      .map(|_| ())
      .map_err(|_| CapabilityError::MissingTool(GH.to_string()))
  }

  async fn authenticate(&self, token: &str, protocol: GitProtocol) -> Result<(), CapabilityError> {
    info!(host = %self.host, "authenticating with remote host");
    run_checked(
      GH,
      &[
        "auth",
        "login",
        "--hostname",
        self.host.as_str(),
        "--git-protocol",
        protocol.as_str(),
        "--with-token",
      ],
      Some(token),
    )
    .await?;
    Ok(())
  }

  async fn switch_active_user(&self, user: &str) -> Result<(), CapabilityError> {
    info!(host = %self.host, user = %user, "switching active remote user");
    run_checked(GH, &["auth", "switch", "--hostname", self.host.as_str(), "--user", user], None).await?;
    Ok(())
  }

  async fn current_scopes(&self) -> Result<BTreeSet<String>, CapabilityError> {
    let response = self.api(&["-i", "user"]).await?;
    let scopes = parse_scopes(&response).ok_or_else(|| CapabilityError::Parse {
      cmd: "gh api -i user".to_string(),
      message: "response has no X-Oauth-Scopes header".to_string(),
    })?;
    debug!(scopes = ?scopes, "granted scopes");
    Ok(scopes)
  }

  async fn upload_public_key(&self, kind: KeyKind, material: &str, title: &str) -> Result<String, CapabilityError> {
    info!(kind = %kind, title = %title, "uploading public key");
    let endpoint = Self::endpoint(kind);
    let (title_field, key_field) = match kind {
      KeyKind::Ssh => (format!("title={}", title), format!("key={}", material.trim())),
      KeyKind::Signing => (format!("name={}", title), format!("armored_public_key={}", material)),
    };
    let body = self
      .api(&["-X", "POST", endpoint, "-f", title_field.as_str(), "-f", key_field.as_str()])
      .await?;

    let id = match kind {
      KeyKind::Ssh => parse_json::<SshKeyResponse>(endpoint, &body)?.id,
      KeyKind::Signing => parse_json::<GpgKeyResponse>(endpoint, &body)?.id,
    };
    Ok(id.to_string())
  }

  async fn list_keys(&self, kind: KeyKind) -> Result<Vec<RemoteKey>, CapabilityError> {
    let endpoint = Self::endpoint(kind);
    let url = format!("{}?per_page=100", endpoint);
    let body = self.api(&[url.as_str()]).await?;

    let keys = match kind {
      KeyKind::Ssh => parse_json::<Vec<SshKeyResponse>>(endpoint, &body)?
        .into_iter()
        .map(|k| RemoteKey {
          id: k.id.to_string(),
          title: k.title,
          fingerprint: None,
        })
        .collect(),
      KeyKind::Signing => parse_json::<Vec<GpgKeyResponse>>(endpoint, &body)?
        .into_iter()
        .map(|k| RemoteKey {
          id: k.id.to_string(),
          title: k.name,
          fingerprint: k.key_id,
        })
        .collect(),
    };
    Ok(keys)
  }

  async fn delete_key(&self, kind: KeyKind, id: &str) -> Result<DeleteOutcome, CapabilityError> {
    info!(kind = %kind, id = %id, "deleting remote key");
    let path = format!("{}/{}", Self::endpoint(kind), id);
    let args = ["api", "--hostname", self.host.as_str(), "-X", "DELETE", path.as_str()];
    let output = run(GH, &args, None).await?;

    if output.success() {
      return Ok(DeleteOutcome::Deleted);
    }
    if output.stderr.contains("HTTP 404") {
      return Ok(DeleteOutcome::NotFound);
    }
    Err(CapabilityError::CommandFailed {
      cmd: display_cmd(GH, &args),
      code: output.code,
      stderr: output.stderr.trim().to_string(),
    })
  }

  async fn probe_connectivity(&self, alias: &str) -> Result<i32, CapabilityError> {
    let target = format!("git@{}", alias);
    let args = [
      "-T",
      "-o",
      "BatchMode=yes",
      "-o",
      "StrictHostKeyChecking=accept-new",
      target.as_str(),
    ];
    let output = run(SSH, &args, None).await?;
    debug!(stderr = %output.stderr.trim(), "connectivity probe output");

    output.code.ok_or_else(|| CapabilityError::CommandFailed {
      cmd: display_cmd(SSH, &args),
      code: None,
      stderr: "terminated by signal".to_string(),
    })
  }
}
