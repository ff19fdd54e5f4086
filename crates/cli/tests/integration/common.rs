//! Shared test helpers for CLI integration tests.

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use tempfile::TempDir;

use gitid_lib::block::{self, Markers};
use gitid_lib::consts::{APP_NAME, DEFAULT_HOST};
use gitid_lib::identity::{Alias, Identity};
use gitid_lib::layout::{Layout, public_key_path};
use gitid_lib::manifest::{self, ManagedBlocks, Manifest, ProvisionFlags, SshArtifact};
use gitid_lib::provision::render;

/// Unrelated content the user already had in `~/.ssh/config`.
pub const SSH_PREAMBLE: &str = "Host *\n  ServerAliveInterval 60\n";

/// Unrelated content the user already had in `~/.gitconfig`.
pub const GIT_PREAMBLE: &str = "[core]\n\teditor = vim\n";

/// Isolated test environment.
///
/// Each test gets its own home, data directory and workspace.
pub struct TestEnv {
  pub temp: TempDir,
}

impl TestEnv {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  fn dir(&self, name: &str) -> PathBuf {
    let p = self.temp.path().join(name);
    fs::create_dir_all(&p).unwrap();
    dunce::canonicalize(&p).unwrap_or(p)
  }

  pub fn home(&self) -> PathBuf {
    self.dir("home")
  }

  /// Data path; state lives in `<data>/gitid`.
  pub fn data_path(&self) -> PathBuf {
    self.dir("data")
  }

  pub fn workspace(&self) -> PathBuf {
    self.dir("ws")
  }

  pub fn layout(&self) -> Layout {
    Layout::new(self.home(), self.data_path().join(APP_NAME))
  }

  /// Write a file relative to the home directory.
  pub fn write_home_file(&self, relative_path: &str, content: &str) {
    let path = self.home().join(relative_path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
  }

  /// Read a file relative to the home directory, `None` if missing.
  pub fn read_home_file(&self, relative_path: &str) -> Option<String> {
    fs::read_to_string(self.home().join(relative_path)).ok()
  }

  /// Lay down the local artifacts and manifest of a provisioned identity
  /// without touching any external tool. Returns the manifest path.
  pub fn seed_identity(&self, alias: &str) -> PathBuf {
    let layout = self.layout();
    let alias = Alias::parse(alias).unwrap();
    let identity = Identity::new(alias.clone(), self.workspace(), "alice", "alice@example.com").unwrap();
    let markers = Markers::new(&identity.namespace, &identity.alias);

    let key = layout.ssh_key(&alias);
    fs::create_dir_all(layout.ssh_dir()).unwrap();
    fs::write(&key, "PRIVATE KEY\n").unwrap();
    fs::write(public_key_path(&key), "ssh-ed25519 AAAAtest\n").unwrap();

    let ssh_block = block::render(&markers, &render::ssh_config_body(alias.as_str(), DEFAULT_HOST, &key));
    let ssh = block::upsert_file(&layout.ssh_config(), &ssh_block, &markers).unwrap();

    let name = Layout::identity_config_name(&alias);
    let include_block = block::render(&markers, &render::include_body(&identity.workspace, &name));
    let include = block::upsert_file(&layout.git_config(), &include_block, &markers).unwrap();

    fs::write(
      layout.identity_config(&alias),
      render::identity_config(&identity, DEFAULT_HOST, None),
    )
    .unwrap();

    let artifact = SshArtifact {
      private_path: key.clone(),
      public_path: public_key_path(&key),
      created: true,
      reused: false,
      remote: None,
    };
    let blocks = ManagedBlocks {
      ssh_config: layout.ssh_config(),
      ssh_block: ssh.block,
      git_config: layout.git_config(),
      include_block: include.block,
      identity_config: layout.identity_config(&alias),
    };
    let flags = ProvisionFlags {
      created_at: 1_700_000_000,
      ..Default::default()
    };
    let manifest = Manifest::build(&identity, DEFAULT_HOST, Some(&artifact), None, &blocks, &flags);

    let path = layout.manifest_path(&identity.namespace);
    manifest::persist(&manifest, &path).unwrap();
    path
  }

  /// Get a pre-configured Command for the gitid binary.
  ///
  /// Sets environment variables for isolated testing:
  /// - `HOME` / `USERPROFILE`: Isolated home (ssh and git config)
  /// - `XDG_DATA_HOME` / `APPDATA`: Isolated data path (manifests)
  pub fn gitid_cmd(&self) -> Command {
    let mut cmd: Command = cargo_bin_cmd!("gitid");
    cmd.env("HOME", self.home());
    cmd.env("USERPROFILE", self.home());
    cmd.env("XDG_DATA_HOME", self.data_path());
    cmd.env("APPDATA", self.data_path());
    cmd.env_remove("GITID_TOKEN");
    cmd.env_remove("RUST_LOG");
    cmd
  }
}
