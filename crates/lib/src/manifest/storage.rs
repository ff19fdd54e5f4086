//! Manifest storage for gitid.
//!
//! # Storage Layout
//!
//! ```text
//! {state_root}/
//! └── <namespace>/
//!     └── manifest.json   # owner read/write only
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::consts::{MANIFEST_FILENAME, MANIFEST_VERSION};

use super::types::Manifest;

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("manifest not found: {0}")]
  NotFound(PathBuf),

  /// The file exists but cannot be parsed; cleanup has no safe fallback.
  #[error("manifest {path} is corrupt: {source}")]
  Corrupt {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("manifest {path} has unsupported version {version} (max {max})", max = MANIFEST_VERSION)]
  UnsupportedVersion { path: PathBuf, version: u32 },

  #[error("failed to read manifest {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write manifest {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to serialize manifest: {0}")]
  Serialize(#[source] serde_json::Error),
}

/// Write the manifest atomically with owner-only permissions.
///
/// Parent directories are created as needed.
pub fn persist(manifest: &Manifest, path: &Path) -> Result<(), ManifestError> {
  let write_err = |source| ManifestError::Write {
    path: path.to_path_buf(),
    source,
  };

  let dir = path.parent().unwrap_or_else(|| Path::new("."));
  fs::create_dir_all(dir).map_err(write_err)?;

  let mut content = serde_json::to_string_pretty(manifest).map_err(ManifestError::Serialize)?;
  content.push('\n');

  let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
  temp.write_all(content.as_bytes()).map_err(write_err)?;
  temp.as_file().sync_all().map_err(write_err)?;
  restrict_permissions(temp.path()).map_err(write_err)?;
  temp.persist(path).map_err(|e| write_err(e.error))?;

  info!(path = %path.display(), alias = %manifest.alias, "manifest saved");
  Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
  use std::os::unix::fs::PermissionsExt;

  fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
  Ok(())
}

/// Load a manifest, distinguishing missing, corrupt and unsupported files.
pub fn load(path: &Path) -> Result<Manifest, ManifestError> {
  let content = fs::read_to_string(path).map_err(|e| {
    if e.kind() == io::ErrorKind::NotFound {
      ManifestError::NotFound(path.to_path_buf())
    } else {
      ManifestError::Read {
        path: path.to_path_buf(),
        source: e,
      }
    }
  })?;

  let manifest: Manifest = serde_json::from_str(&content).map_err(|source| ManifestError::Corrupt {
    path: path.to_path_buf(),
    source,
  })?;

  if manifest.version > MANIFEST_VERSION {
    return Err(ManifestError::UnsupportedVersion {
      path: path.to_path_buf(),
      version: manifest.version,
    });
  }

  debug!(path = %path.display(), alias = %manifest.alias, "manifest loaded");
  Ok(manifest)
}

/// Delete a manifest file. Returns `false` if it was already gone.
pub fn delete(path: &Path) -> Result<bool, ManifestError> {
  match fs::remove_file(path) {
    Ok(()) => {}
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
    Err(e) => {
      return Err(ManifestError::Write {
        path: path.to_path_buf(),
        source: e,
      });
    }
  }

  // the namespace directory only ever holds the manifest
  if let Some(dir) = path.parent() {
    let _ = fs::remove_dir(dir);
  }
  Ok(true)
}

/// A manifest found under the state root.
#[derive(Debug)]
pub struct ListedManifest {
  pub path: PathBuf,
  pub manifest: Result<Manifest, ManifestError>,
}

/// Enumerate `<state_root>/*/manifest.json`, sorted by path.
///
/// A missing state root yields an empty list. Unreadable entries are
/// returned with their error rather than failing the listing.
pub fn list(state_root: &Path) -> Result<Vec<ListedManifest>, ManifestError> {
  let entries = match fs::read_dir(state_root) {
    Ok(entries) => entries,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
    Err(e) => {
      return Err(ManifestError::Read {
        path: state_root.to_path_buf(),
        source: e,
      });
    }
  };

  let mut paths: Vec<PathBuf> = entries
    .filter_map(|entry| match entry {
      Ok(entry) => Some(entry.path().join(MANIFEST_FILENAME)),
      Err(e) => {
        warn!(error = %e, "skipping unreadable state entry");
        None
      }
    })
    .filter(|p| p.is_file())
    .collect();
  paths.sort();

  Ok(
    paths
      .into_iter()
      .map(|path| ListedManifest {
        manifest: load(&path),
        path,
      })
      .collect(),
  )
}
