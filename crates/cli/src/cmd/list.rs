//! Implementation of the `gitid list` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use gitid_lib::layout::Layout;
use gitid_lib::manifest;

use crate::output::{OutputFormat, format_timestamp, print_info, print_json, print_stat, print_warning};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IdentitySummary {
  alias: String,
  namespace: String,
  workspace: PathBuf,
  user: String,
  email: String,
  host: String,
  created_at: u64,
  signing: bool,
  uploaded: bool,
  manifest: PathBuf,
}

pub fn cmd_list(output: OutputFormat) -> Result<()> {
  let layout = Layout::from_env().context("Failed to resolve home and data directories")?;
  let listed = manifest::list(&layout.state_root).context("Failed to list manifests")?;

  let mut identities = Vec::new();
  for entry in listed {
    match entry.manifest {
      Ok(m) => identities.push(IdentitySummary {
        alias: m.alias,
        namespace: m.namespace,
        workspace: m.workspace,
        user: m.identity_user,
        email: m.identity_email,
        host: m.host,
        created_at: m.created_at,
        signing: m.signing.enabled,
        uploaded: m.ssh.uploaded,
        manifest: entry.path,
      }),
      Err(e) => print_warning(&format!("Skipping {}: {}", entry.path.display(), e)),
    }
  }

  if output.is_json() {
    return print_json(&identities);
  }

  if identities.is_empty() {
    print_info("No identities provisioned");
    return Ok(());
  }

  for id in &identities {
    println!("{}", id.alias);
    print_stat("Workspace", &id.workspace.display().to_string());
    print_stat("User", &format!("{} <{}> on {}", id.user, id.email, id.host));
    print_stat("Signing", if id.signing { "yes" } else { "no" });
    print_stat("Registered", if id.uploaded { "yes" } else { "no" });
    print_stat("Created", &format_timestamp(id.created_at));
    print_stat("Manifest", &id.manifest.display().to_string());
  }

  Ok(())
}
