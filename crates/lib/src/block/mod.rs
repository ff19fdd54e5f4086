//! Managed blocks inside shared, line-oriented text files.
//!
//! A managed block is a contiguous span delimited by a begin and an end marker
//! line derived from a `(namespace, alias)` pair:
//!
//! ```text
//! # gitid-3fa9c2e1 work begin
//! Host work
//!   HostName github.com
//! # gitid-3fa9c2e1 work end
//! ```
//!
//! Blocks are atomic: they are inserted whole, found whole or removed whole.
//! Removal undoes the separator added on insertion, so
//! `remove(insert(F, B)) == F` byte-for-byte.

pub mod guard;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::consts::MARKER_COMMENT;
use crate::identity::{Alias, Namespace};

/// Begin and end marker lines for one identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
  pub begin: String,
  pub end: String,
}

impl Markers {
  /// Markers using the default `#` comment leader.
  pub fn new(namespace: &Namespace, alias: &Alias) -> Self {
    Self::with_comment(MARKER_COMMENT, namespace.as_str(), alias.as_str())
  }

  pub fn with_comment(comment: &str, namespace: &str, alias: &str) -> Self {
    Self {
      begin: format!("{} {} {} begin", comment, namespace, alias),
      end: format!("{} {} {} end", comment, namespace, alias),
    }
  }
}

/// Byte range of a block: from the begin line's first byte through the end
/// line's newline (or end of text when the end line has none).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
  pub start: usize,
  pub end: usize,
}

/// Whether a block was written or already present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockOutcome {
  Inserted,
  Reused,
}

/// Result of [`insert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insertion {
  /// File content after insertion (unchanged when reused).
  pub text: String,
  /// The block as it now appears in the file, always newline-terminated.
  pub block: String,
  pub outcome: BlockOutcome,
}

/// How a block was located for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalMethod {
  /// The previously recorded block text matched exactly.
  Exact,
  /// The recorded text was edited, but the markers survived.
  Markers,
  /// Nothing to remove.
  Absent,
}

#[derive(Debug, Error)]
pub enum BlockError {
  #[error("failed to read {path}: {source}")]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to write {path}: {source}")]
  Write {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Wrap `body` between the marker lines. The result ends with a newline.
pub fn render(markers: &Markers, body: &str) -> String {
  format!("{}\n{}\n{}\n", markers.begin, body.trim_end_matches('\n'), markers.end)
}

/// Iterate `(line_start, line, next_line_start)`, with the newline (and a
/// preceding `\r`) stripped from `line`.
fn line_spans(text: &str) -> impl Iterator<Item = (usize, &str, usize)> {
  let mut offset = 0;
  std::iter::from_fn(move || {
    if offset >= text.len() {
      return None;
    }
    let start = offset;
    let rest = &text[start..];
    let (line, next) = match rest.find('\n') {
      Some(i) => (&rest[..i], start + i + 1),
      None => (rest, text.len()),
    };
    offset = next;
    Some((start, line.strip_suffix('\r').unwrap_or(line), next))
  })
}

/// True if some whole line of `text` equals `line`.
pub fn contains_line(text: &str, line: &str) -> bool {
  line_spans(text).any(|(_, l, _)| l == line)
}

/// Locate the block: first begin line, then the first end line after it.
///
/// A begin line with no end line after it is treated as absent, so a
/// malformed file never causes removal through end of file.
pub fn find(text: &str, markers: &Markers) -> Option<Span> {
  let mut begin = None;
  for (start, line, next) in line_spans(text) {
    match begin {
      None if line == markers.begin => begin = Some(start),
      Some(start) if line == markers.end => return Some(Span { start, end: next }),
      _ => {}
    }
  }
  None
}

fn newline_terminated(s: &str) -> String {
  if s.ends_with('\n') {
    s.to_string()
  } else {
    format!("{}\n", s)
  }
}

/// Append `block` unless a block with the same markers already exists.
pub fn insert(text: &str, block: &str, markers: &Markers) -> Insertion {
  if let Some(span) = find(text, markers) {
    return Insertion {
      text: text.to_string(),
      block: newline_terminated(&text[span.start..span.end]),
      outcome: BlockOutcome::Reused,
    };
  }

  let block = newline_terminated(block);
  let new_text = if text.is_empty() {
    block.clone()
  } else if text.ends_with('\n') {
    format!("{}\n{}", text, block)
  } else {
    // keep the file's missing trailing newline
    format!("{}\n\n{}", text, block.trim_end_matches('\n'))
  };

  Insertion {
    text: new_text,
    block,
    outcome: BlockOutcome::Inserted,
  }
}

/// Delete exactly `span`, collapsing the blank separator in front of it.
pub fn remove(text: &str, span: Span) -> String {
  let mut before = text[..span.start].to_string();
  let after = &text[span.end..];

  if after.is_empty() && !text[..span.end].ends_with('\n') {
    // tail block without trailing newline: undo the "\n\n" separator
    if before.ends_with("\n\n") {
      before.truncate(before.len() - 2);
    }
  } else if before.ends_with("\n\n") {
    before.pop();
  }

  before.push_str(after);
  before
}

/// Remove the block delimited by `markers`; `None` if it is absent.
pub fn remove_block(text: &str, markers: &Markers) -> Option<String> {
  find(text, markers).map(|span| remove(text, span))
}

/// Locate the exact recorded block text at a line boundary.
fn find_exact(text: &str, recorded: &str) -> Option<Span> {
  let needle = recorded.trim_end_matches('\n');
  if needle.is_empty() {
    return None;
  }
  let mut from = 0;
  while let Some(pos) = text[from..].find(needle) {
    let start = from + pos;
    let end = start + needle.len();
    let at_line_start = start == 0 || text.as_bytes()[start - 1] == b'\n';
    let rest = &text[end..];
    if at_line_start {
      if rest.is_empty() {
        return Some(Span { start, end });
      }
      if rest.starts_with('\n') {
        return Some(Span { start, end: end + 1 });
      }
      if rest.starts_with("\r\n") {
        return Some(Span { start, end: end + 2 });
      }
    }
    from = start + 1;
  }
  None
}

/// Remove a previously recorded block: exact text first, then marker span.
pub fn remove_recorded(text: &str, recorded: Option<&str>, markers: &Markers) -> (String, RemovalMethod) {
  if let Some(span) = recorded.and_then(|r| find_exact(text, r)) {
    return (remove(text, span), RemovalMethod::Exact);
  }
  match remove_block(text, markers) {
    Some(new_text) => (new_text, RemovalMethod::Markers),
    None => (text.to_string(), RemovalMethod::Absent),
  }
}

/// Read a file, treating a missing file as empty.
pub fn read_or_empty(path: &Path) -> Result<String, BlockError> {
  match fs::read_to_string(path) {
    Ok(content) => Ok(content),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
    Err(e) => Err(BlockError::Read {
      path: path.to_path_buf(),
      source: e,
    }),
  }
}

fn write_text(path: &Path, text: &str) -> Result<(), BlockError> {
  let write_err = |source| BlockError::Write {
    path: path.to_path_buf(),
    source,
  };
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).map_err(write_err)?;
  }
  fs::write(path, text).map_err(write_err)
}

/// Insert `block` into the file at `path`, re-reading it first.
///
/// The file is only written when the block was not already present.
pub fn upsert_file(path: &Path, block: &str, markers: &Markers) -> Result<Insertion, BlockError> {
  let current = read_or_empty(path)?;
  let insertion = insert(&current, block, markers);

  match insertion.outcome {
    BlockOutcome::Inserted => {
      write_text(path, &insertion.text)?;
      info!(path = %path.display(), marker = %markers.begin, "managed block inserted");
    }
    BlockOutcome::Reused => {
      info!(path = %path.display(), marker = %markers.begin, "managed block already present");
    }
  }

  Ok(insertion)
}

/// Remove a recorded block from the file at `path`, re-reading it first.
///
/// A missing file or a missing block is reported as [`RemovalMethod::Absent`].
pub fn remove_from_file(path: &Path, recorded: Option<&str>, markers: &Markers) -> Result<RemovalMethod, BlockError> {
  let current = read_or_empty(path)?;
  let (new_text, method) = remove_recorded(&current, recorded, markers);

  debug!(path = %path.display(), method = ?method, "managed block lookup");
  if method != RemovalMethod::Absent {
    write_text(path, &new_text)?;
  }
  Ok(method)
}
