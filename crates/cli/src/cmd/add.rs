//! Implementation of the `gitid add` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use gitid_lib::block::BlockOutcome;
use gitid_lib::capability::{GhRemote, SystemKeyGen};
use gitid_lib::layout::Layout;
use gitid_lib::provision::{ProbeResult, ProvisionRequest, provision};

use crate::output::{print_info, print_stat, print_success, print_warning};

pub struct AddArgs {
  pub alias: String,
  pub user: String,
  pub email: String,
  pub workspace: PathBuf,
  pub host: String,
  pub token: Option<String>,
  pub signing: bool,
}

fn block_state(outcome: BlockOutcome) -> &'static str {
  match outcome {
    BlockOutcome::Inserted => "added",
    BlockOutcome::Reused => "unchanged",
  }
}

/// Execute the add command.
///
/// Provisions the identity end to end and prints where everything landed.
/// Without a token the remote registration steps are printed instead.
pub fn cmd_add(args: AddArgs) -> Result<()> {
  let layout = Layout::from_env().context("Failed to resolve home and data directories")?;
  let request = ProvisionRequest {
    alias: args.alias,
    user: args.user,
    email: args.email,
    workspace: args.workspace,
    host: args.host.clone(),
    token: args.token,
    signing: args.signing,
  };

  let keygen = SystemKeyGen::new();
  let remote = GhRemote::new(args.host);

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt
    .block_on(provision(&request, &layout, &keygen, &remote))
    .context("Provisioning failed")?;

  let manifest = &report.manifest;
  println!();
  print_success(&format!("Identity '{}' provisioned", manifest.alias));
  if let Some(key) = &manifest.ssh.key_path {
    print_stat("SSH key", &key.display().to_string());
  }
  print_stat(
    "SSH config",
    &format!("{} ({})", manifest.ssh.config_path.display(), block_state(report.ssh_block)),
  );
  print_stat(
    "Git include",
    &format!("{} ({})", manifest.git.config_path.display(), block_state(report.include_block)),
  );
  if let Some(path) = &manifest.git.per_identity_config_path {
    print_stat("Identity config", &path.display().to_string());
  }
  if let Some(fingerprint) = &manifest.signing.fingerprint {
    print_stat("Signing key", fingerprint);
  }
  if let ProbeResult::Reachable { code } = report.probe {
    print_stat("Connectivity", &format!("ok (exit {})", code));
  }
  print_stat("Manifest", &report.manifest_path.display().to_string());

  if !report.manual_steps.is_empty() {
    println!();
    print_warning("No token supplied; finish remote setup by hand:");
    for step in &report.manual_steps {
      print_info(step);
    }
  }

  Ok(())
}
