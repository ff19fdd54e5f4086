//! Implementation of the `gitid remove` command.
//!
//! Loads the identity's manifest, shows the cleanup plan, and rolls back
//! every recorded artifact. Cleanup misses are reported but do not fail the
//! command; only an unresolvable manifest does.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use owo_colors::{OwoColorize, Stream};
use tracing::debug;

use gitid_lib::capability::{GhRemote, SystemKeyGen};
use gitid_lib::deprovision::{
  ActionOutcome, DeprovisionOptions, DeprovisionReport, ManifestSource, Resolution, execute, plan, resolve,
};
use gitid_lib::layout::Layout;

use crate::output::{print_info, print_removal, print_stat, print_success, print_warning, symbols};
use crate::prompts::TerminalConfirm;

pub fn cmd_remove(alias: Option<String>, manifest: Option<PathBuf>, dry_run: bool, yes: bool) -> Result<()> {
  let source = match (manifest, alias) {
    (Some(path), _) => ManifestSource::Path(path),
    (None, Some(alias)) => ManifestSource::Alias(alias),
    (None, None) => bail!("either --alias or --manifest is required"),
  };

  let layout = Layout::from_env().context("Failed to resolve home and data directories")?;
  debug!(source = ?source, state_root = %layout.state_root.display(), "resolving manifest");
  let (manifest, manifest_path) = match resolve(&source, &layout).context("Failed to load manifest")? {
    Resolution::Found { manifest, path } => (manifest, path),
    Resolution::NothingToDo { path } => {
      print_info(&format!("Nothing to remove (no manifest at {})", path.display()));
      return Ok(());
    }
  };

  let plan = plan(&manifest, &manifest_path);
  println!("Cleanup plan for '{}':", manifest.alias);
  for action in &plan.actions {
    print_removal(&action.to_string());
  }

  let options = DeprovisionOptions {
    dry_run,
    assume_yes: yes,
  };
  let keygen = SystemKeyGen::new();
  let remote = GhRemote::new(manifest.host.clone());

  let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;
  let report = rt
    .block_on(execute(&manifest, plan, options, &keygen, &remote, &TerminalConfirm))
    .context("Cleanup failed")?;

  println!();
  if report.dry_run {
    print_info("Dry run - no changes made");
    return Ok(());
  }
  if report.aborted {
    print_warning("Cleanup cancelled, nothing was changed");
    return Ok(());
  }

  print_results(&report);

  println!();
  if report.manifest_kept() {
    print_warning(&format!(
      "Manifest kept at {}; run again to finish cleanup",
      manifest_path.display()
    ));
  } else {
    print_success(&format!("Identity '{}' removed", manifest.alias));
  }
  print_stat("Removed", &report.done().to_string());
  print_stat("Already absent", &report.already_absent().to_string());
  if report.skipped() + report.declined() + report.failed() > 0 {
    print_stat("Skipped", &report.skipped().to_string());
    print_stat("Declined", &report.declined().to_string());
    print_stat("Failed", &report.failed().to_string());
  }

  Ok(())
}

fn print_results(report: &DeprovisionReport) {
  for result in &report.results {
    let action = result.action.to_string();
    match &result.outcome {
      ActionOutcome::Done => println!(
        "  {} {}",
        symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
        action
      ),
      ActionOutcome::AlreadyAbsent => println!(
        "  {} {} (already absent)",
        symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
        action
      ),
      ActionOutcome::Declined => println!(
        "  {} {} (declined)",
        symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
        action
      ),
      ActionOutcome::Skipped(reason) => println!(
        "  {} {} (skipped: {})",
        symbols::WARNING.if_supports_color(Stream::Stdout, |s| s.yellow()),
        action,
        reason
      ),
      ActionOutcome::Failed(reason) => println!(
        "  {} {} (failed: {})",
        symbols::ERROR.if_supports_color(Stream::Stdout, |s| s.red()),
        action,
        reason
      ),
    }
  }
}
