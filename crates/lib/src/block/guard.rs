//! Refuse to touch files holding unmanaged configuration for an alias.
//!
//! A file is blocked when it contains the conflict pattern (for example
//! `Host work`) but not this identity's begin marker. Such content predates
//! gitid and is never adopted, merged or duplicated.
//!
//! Text inside any complete gitid block is ignored, so another identity's
//! `Host work-2` block does not block alias `work`. Outside gitid blocks the
//! match is a plain substring, so a hand-written `Host work-2` still does.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::consts::{APP_NAME, MARKER_COMMENT};

use super::{BlockError, Markers, contains_line, read_or_empty};

/// Outcome of a collision check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  Clear,
  Blocked,
}

#[derive(Debug, Error)]
pub enum GuardError {
  /// Unmanaged content for this alias exists; the run must abort.
  #[error("{path} already contains '{pattern}' outside gitid markers; remove it by hand or choose another alias")]
  Blocked { path: PathBuf, pattern: String },

  #[error(transparent)]
  Read(#[from] BlockError),
}

/// End marker for a line that opens any gitid-managed block.
fn managed_end(line: &str) -> Option<String> {
  let line = line.trim_end();
  let rest = line.strip_prefix(MARKER_COMMENT)?.trim_start();
  let label = rest.strip_prefix(APP_NAME)?.strip_prefix('-')?.strip_suffix(" begin")?;
  Some(format!("{} {}-{} end", MARKER_COMMENT, APP_NAME, label))
}

/// The lines of `text` outside complete gitid blocks.
///
/// A begin marker without its end marker does not hide anything.
fn unmanaged(text: &str) -> String {
  let mut out = String::new();
  let mut pending = String::new();
  let mut end: Option<String> = None;

  for line in text.lines() {
    match &end {
      Some(marker) => {
        if line.trim_end() == marker {
          end = None;
          pending.clear();
        } else {
          pending.push_str(line);
          pending.push('\n');
        }
      }
      None => match managed_end(line) {
        Some(marker) => {
          end = Some(marker);
          pending.push_str(line);
          pending.push('\n');
        }
        None => {
          out.push_str(line);
          out.push('\n');
        }
      },
    }
  }
  out.push_str(&pending);
  out
}

/// Check file content against a conflict pattern.
pub fn check(text: &str, pattern: &str, markers: &Markers) -> Verdict {
  if unmanaged(text).contains(pattern) && !contains_line(text, &markers.begin) {
    Verdict::Blocked
  } else {
    Verdict::Clear
  }
}

/// Check the current content of `path`; a missing file is clear.
pub fn check_file(path: &Path, pattern: &str, markers: &Markers) -> Result<(), GuardError> {
  let text = read_or_empty(path)?;
  let verdict = check(&text, pattern, markers);
  debug!(path = %path.display(), pattern = %pattern, verdict = ?verdict, "collision check");

  match verdict {
    Verdict::Clear => Ok(()),
    Verdict::Blocked => Err(GuardError::Blocked {
      path: path.to_path_buf(),
      pattern: pattern.to_string(),
    }),
  }
}
