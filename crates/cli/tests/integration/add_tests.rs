//! Add command integration tests.
//!
//! Only failures that happen before any key is generated are exercised here;
//! full runs are covered by the library tests with in-memory capabilities.

use predicates::prelude::*;

use super::common::TestEnv;

fn add_args(env: &TestEnv, alias: &str) -> Vec<String> {
  vec![
    "add".to_string(),
    "--alias".to_string(),
    alias.to_string(),
    "--user".to_string(),
    "alice".to_string(),
    "--email".to_string(),
    "alice@example.com".to_string(),
    "--workspace".to_string(),
    env.workspace().display().to_string(),
  ]
}

#[test]
fn missing_workspace_fails() {
  let env = TestEnv::new();
  let missing = env.temp.path().join("missing").display().to_string();

  env
    .gitid_cmd()
    .args([
      "add",
      "--alias",
      "work",
      "--user",
      "alice",
      "--email",
      "alice@example.com",
      "--workspace",
      missing.as_str(),
    ])
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("does not exist"));

  assert!(env.read_home_file(".ssh/config").is_none());
}

#[test]
fn invalid_alias_fails() {
  let env = TestEnv::new();

  env
    .gitid_cmd()
    .args(add_args(&env, "bad alias"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("invalid alias"));
}

#[test]
fn unmanaged_ssh_host_blocks_run() {
  let env = TestEnv::new();
  let original = "Host work\n  HostName github.com\n  IdentityFile ~/.ssh/id_work\n";
  env.write_home_file(".ssh/config", original);

  env
    .gitid_cmd()
    .args(add_args(&env, "work"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("outside gitid markers"));

  assert_eq!(env.read_home_file(".ssh/config").as_deref(), Some(original));
  assert!(env.read_home_file(".gitconfig").is_none());
  assert!(env.read_home_file(".ssh/id_ed25519_work").is_none());
}

#[test]
fn unmanaged_include_blocks_run() {
  let env = TestEnv::new();
  let original = "[includeIf \"gitdir:~/src/\"]\n\tpath = .gitconfig-work\n";
  env.write_home_file(".gitconfig", original);

  env
    .gitid_cmd()
    .args(add_args(&env, "work"))
    .assert()
    .failure()
    .stderr(predicate::str::contains("path = .gitconfig-work"));

  assert_eq!(env.read_home_file(".gitconfig").as_deref(), Some(original));
}

#[test]
fn foreign_identity_config_blocks_run() {
  let env = TestEnv::new();
  env.write_home_file(".gitconfig-work", "[user]\n\tname = someone else\n");

  env
    .gitid_cmd()
    .args(add_args(&env, "work"))
    .assert()
    .failure()
    .stderr(predicate::str::contains(".gitconfig-work"));

  assert_eq!(
    env.read_home_file(".gitconfig-work").as_deref(),
    Some("[user]\n\tname = someone else\n")
  );
}
