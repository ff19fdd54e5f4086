//! gitid: provision and roll back per-workspace Git identities.

mod cmd;
mod output;
mod prompts;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gitid_lib::consts::DEFAULT_HOST;

use crate::output::{OutputFormat, print_error};

/// Per-workspace Git identities with their own SSH and signing keys
#[derive(Parser)]
#[command(name = "gitid")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Provision an identity for a workspace
  Add {
    /// Short name for the identity (also the SSH host alias)
    #[arg(long)]
    alias: String,

    /// Account name on the remote host
    #[arg(long)]
    user: String,

    /// Commit email address
    #[arg(long)]
    email: String,

    /// Directory whose repositories use this identity
    #[arg(long)]
    workspace: PathBuf,

    /// Remote host name
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Access token for registering keys remotely
    #[arg(long, env = "GITID_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Also create a commit signing key
    #[arg(long)]
    signing: bool,
  },

  /// Remove everything recorded for an identity
  #[command(group(ArgGroup::new("target").required(true).args(["alias", "manifest"])))]
  Remove {
    /// Alias of the identity to remove (case-insensitive)
    #[arg(long)]
    alias: Option<String>,

    /// Path to a manifest file
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Show the cleanup plan without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Skip all confirmation prompts
    #[arg(short = 'y', long)]
    yes: bool,
  },

  /// List provisioned identities
  List {
    /// Output format
    #[arg(short = 'o', long, value_enum, default_value = "text")]
    output: OutputFormat,
  },
}

fn init_logging(verbose: bool) {
  let default = if verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  let result = match cli.command {
    Commands::Add {
      alias,
      user,
      email,
      workspace,
      host,
      token,
      signing,
    } => cmd::cmd_add(cmd::AddArgs {
      alias,
      user,
      email,
      workspace,
      host,
      token,
      signing,
    }),
    Commands::Remove {
      alias,
      manifest,
      dry_run,
      yes,
    } => cmd::cmd_remove(alias, manifest, dry_run, yes),
    Commands::List { output } => cmd::cmd_list(output),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("error: {:#}", e));
      ExitCode::FAILURE
    }
  }
}
