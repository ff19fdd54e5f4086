//! Filesystem layout for managed identities.
//!
//! # Layout
//!
//! ```text
//! {home}/.ssh/config                      # SSH client config (managed block)
//! {home}/.ssh/id_ed25519_<alias>[.pub]    # SSH keypair
//! {home}/.gitconfig                       # VCS root config (managed include block)
//! {home}/.gitconfig-<alias>               # per-identity config
//! {state_root}/<namespace>/manifest.json  # rollback manifest
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::consts::{GIT_CONFIG_SUFFIX, MANIFEST_FILENAME};
use crate::identity::{Alias, Namespace};
use crate::platform::paths::{data_dir, home_dir};

#[derive(Debug, Error)]
pub enum LayoutError {
  #[error("cannot determine home directory (HOME is not set)")]
  NoHome,

  #[error("cannot determine data directory for state files")]
  NoDataDir,
}

/// Root directories every derived path hangs off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
  pub home: PathBuf,
  pub state_root: PathBuf,
}

impl Layout {
  pub fn new(home: impl Into<PathBuf>, state_root: impl Into<PathBuf>) -> Self {
    Self {
      home: home.into(),
      state_root: state_root.into(),
    }
  }

  /// Resolve the layout from `HOME` and the platform data directory.
  pub fn from_env() -> Result<Self, LayoutError> {
    let home = home_dir().ok_or(LayoutError::NoHome)?;
    let state_root = data_dir().ok_or(LayoutError::NoDataDir)?;
    Ok(Self { home, state_root })
  }

  pub fn ssh_dir(&self) -> PathBuf {
    self.home.join(".ssh")
  }

  pub fn ssh_config(&self) -> PathBuf {
    self.ssh_dir().join("config")
  }

  pub fn ssh_key(&self, alias: &Alias) -> PathBuf {
    self.ssh_dir().join(format!("id_ed25519_{}", alias))
  }

  pub fn git_config(&self) -> PathBuf {
    self.home.join(".gitconfig")
  }

  /// File name of the per-identity config, relative to the root config.
  pub fn identity_config_name(alias: &Alias) -> String {
    format!(".{}-{}", GIT_CONFIG_SUFFIX, alias)
  }

  pub fn identity_config(&self, alias: &Alias) -> PathBuf {
    self.home.join(Self::identity_config_name(alias))
  }

  pub fn state_dir(&self, namespace: &Namespace) -> PathBuf {
    self.state_root.join(namespace.as_str())
  }

  pub fn manifest_path(&self, namespace: &Namespace) -> PathBuf {
    self.state_dir(namespace).join(MANIFEST_FILENAME)
  }
}

/// Public key path that belongs to a private key path.
pub fn public_key_path(private: &Path) -> PathBuf {
  let mut name = private.as_os_str().to_owned();
  name.push(".pub");
  PathBuf::from(name)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn derived_paths() {
    let layout = Layout::new("/home/u", "/data/gitid");
    let alias = Alias::parse("host-alice").unwrap();
    let ns = Namespace::derive(&alias);

    assert_eq!(layout.ssh_config(), PathBuf::from("/home/u/.ssh/config"));
    assert_eq!(layout.ssh_key(&alias), PathBuf::from("/home/u/.ssh/id_ed25519_host-alice"));
    assert_eq!(
      public_key_path(&layout.ssh_key(&alias)),
      PathBuf::from("/home/u/.ssh/id_ed25519_host-alice.pub")
    );
    assert_eq!(layout.identity_config(&alias), PathBuf::from("/home/u/.gitconfig-host-alice"));
    assert_eq!(
      layout.manifest_path(&ns),
      PathBuf::from("/data/gitid").join(ns.as_str()).join("manifest.json")
    );
  }
}
