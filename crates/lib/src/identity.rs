//! Identity naming: aliases, namespaces and the tag stamped on every artifact.
//!
//! The namespace is a pure function of the alias so that cleanup can locate
//! markers and state for an alias without reading anything from disk.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{APP_NAME, NAMESPACE_HASH_LEN};
use crate::util::hash::short_hash;

/// Errors raised while resolving identity inputs.
#[derive(Debug, Error)]
pub enum IdentityError {
  /// The alias is empty or contains characters unusable in paths and marker lines.
  #[error("invalid alias '{0}': use only letters, digits, '.', '_' or '-'")]
  InvalidAlias(String),

  /// The contact address does not look like an email address.
  #[error("invalid email address '{0}'")]
  InvalidEmail(String),

  /// The remote account name is empty.
  #[error("remote user must not be empty")]
  EmptyUser,
}

/// A normalized, case-insensitive identity alias.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Alias(String);

impl Alias {
  /// Parse and normalize an alias (trimmed, lowercased).
  pub fn parse(raw: &str) -> Result<Self, IdentityError> {
    let normalized = raw.trim().to_ascii_lowercase();
    let valid = !normalized.is_empty()
      && !normalized.starts_with('.')
      && normalized
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
    if !valid {
      return Err(IdentityError::InvalidAlias(raw.to_string()));
    }
    Ok(Self(normalized))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Alias {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Scoping prefix for markers and state, derived from the alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespace(String);

impl Namespace {
  /// Derive the namespace for an alias: `gitid-<8 hex chars of sha256(alias)>`.
  pub fn derive(alias: &Alias) -> Self {
    Self(format!(
      "{}-{}",
      APP_NAME,
      short_hash(alias.as_str().as_bytes(), NAMESPACE_HASH_LEN)
    ))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for Namespace {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// The unit of provisioning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
  pub namespace: Namespace,
  pub alias: Alias,
  /// Directory subtree whose repositories use this identity.
  pub workspace: PathBuf,
  /// Account name on the remote host.
  pub user: String,
  /// Commit attribution and key metadata address.
  pub email: String,
}

impl Identity {
  pub fn new(alias: Alias, workspace: PathBuf, user: &str, email: &str) -> Result<Self, IdentityError> {
    let user = user.trim();
    if user.is_empty() {
      return Err(IdentityError::EmptyUser);
    }
    let email = email.trim();
    if !looks_like_email(email) {
      return Err(IdentityError::InvalidEmail(email.to_string()));
    }
    Ok(Self {
      namespace: Namespace::derive(&alias),
      alias,
      workspace,
      user: user.to_string(),
      email: email.to_string(),
    })
  }

  /// Comment stamped on keys and remote titles: `"<namespace> <alias>"`.
  pub fn tag(&self) -> String {
    format!("{} {}", self.namespace, self.alias)
  }
}

fn looks_like_email(s: &str) -> bool {
  match s.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty() && !domain.is_empty() && !s.chars().any(|c| c.is_whitespace() || matches!(c, '<' | '>'))
    }
    None => false,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn alias_is_normalized() {
    let alias = Alias::parse("  Host-Alice ").unwrap();
    assert_eq!(alias.as_str(), "host-alice");
  }

  #[test]
  fn alias_rejects_unsafe_characters() {
    for raw in ["", "   ", "a b", "a/b", "../x", ".hidden", "al!ce"] {
      assert!(Alias::parse(raw).is_err(), "{:?} should be rejected", raw);
    }
  }

  #[test]
  fn namespace_is_pure_function_of_alias() {
    let a = Namespace::derive(&Alias::parse("host-alice").unwrap());
    let b = Namespace::derive(&Alias::parse("HOST-ALICE").unwrap());
    let c = Namespace::derive(&Alias::parse("host-bob").unwrap());
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert!(a.as_str().starts_with("gitid-"));
    assert_eq!(a.as_str().len(), "gitid-".len() + NAMESPACE_HASH_LEN);
  }

  #[test]
  fn identity_validates_user_and_email() {
    let alias = Alias::parse("work").unwrap();
    assert!(matches!(
      Identity::new(alias.clone(), PathBuf::from("/tmp"), " ", "a@b.c"),
      Err(IdentityError::EmptyUser)
    ));
    assert!(matches!(
      Identity::new(alias.clone(), PathBuf::from("/tmp"), "alice", "not-an-email"),
      Err(IdentityError::InvalidEmail(_))
    ));
    let id = Identity::new(alias, PathBuf::from("/tmp"), "alice", "alice@example.com").unwrap();
    assert_eq!(id.tag(), format!("{} work", id.namespace));
  }
}
