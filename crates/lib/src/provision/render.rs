//! Text rendered into the shared and per-identity configuration files.

use std::path::Path;

use crate::identity::Identity;

/// Path as git and ssh expect it: forward slashes, no trailing separator.
pub fn config_path_str(path: &Path) -> String {
  let s = path.to_string_lossy().replace('\\', "/");
  match s.trim_end_matches('/') {
    "" => "/".to_string(),
    trimmed => trimmed.to_string(),
  }
}

/// Body of the SSH client config block.
pub fn ssh_config_body(alias: &str, host: &str, key_path: &Path) -> String {
  format!(
    "Host {}\n  HostName {}\n  User git\n  IdentityFile {}\n  IdentitiesOnly yes",
    alias,
    host,
    config_path_str(key_path)
  )
}

/// Pattern marking an unmanaged SSH host entry for `alias`.
pub fn ssh_conflict_pattern(alias: &str) -> String {
  format!("Host {}", alias)
}

/// Body of the root VCS config include block.
pub fn include_body(workspace: &Path, identity_config_name: &str) -> String {
  format!(
    "[includeIf \"gitdir:{}/**\"]\n\tpath = {}",
    config_path_str(workspace),
    identity_config_name
  )
}

/// Pattern marking an unmanaged include of the per-identity file.
pub fn include_conflict_pattern(identity_config_name: &str) -> String {
  format!("path = {}", identity_config_name)
}

/// Full per-identity VCS config.
pub fn identity_config(identity: &Identity, host: &str, signing_key: Option<&str>) -> String {
  let mut out = format!(
    "[user]\n\tname = {}\n\temail = {}\n",
    identity.user, identity.email
  );
  if let Some(fingerprint) = signing_key {
    out.push_str(&format!("\tsigningkey = {}\n", fingerprint));
  }
  out.push_str(&format!(
    "[url \"git@{alias}:\"]\n\tinsteadOf = git@{host}:\n\tinsteadOf = https://{host}/\n",
    alias = identity.alias,
    host = host
  ));
  if signing_key.is_some() {
    out.push_str("[commit]\n\tgpgsign = true\n[tag]\n\tgpgsign = true\n");
  }
  out
}
