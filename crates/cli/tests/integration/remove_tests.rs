//! Remove command integration tests.

use std::fs;

use predicates::prelude::*;

use super::common::{GIT_PREAMBLE, SSH_PREAMBLE, TestEnv};

fn seeded(alias: &str) -> (TestEnv, std::path::PathBuf) {
  let env = TestEnv::new();
  env.write_home_file(".ssh/config", SSH_PREAMBLE);
  env.write_home_file(".gitconfig", GIT_PREAMBLE);
  let manifest = env.seed_identity(alias);
  (env, manifest)
}

#[test]
fn dry_run_changes_nothing() {
  let (env, manifest) = seeded("work");
  let ssh_before = env.read_home_file(".ssh/config");
  let git_before = env.read_home_file(".gitconfig");

  env
    .gitid_cmd()
    .args(["remove", "--alias", "work", "--dry-run"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Cleanup plan for 'work'"))
    .stdout(predicate::str::contains("delete identity config"))
    .stdout(predicate::str::contains("delete ssh private key"))
    .stdout(predicate::str::contains("delete manifest"))
    .stdout(predicate::str::contains("Dry run"));

  assert_eq!(env.read_home_file(".ssh/config"), ssh_before);
  assert_eq!(env.read_home_file(".gitconfig"), git_before);
  assert!(env.read_home_file(".gitconfig-work").is_some());
  assert!(env.read_home_file(".ssh/id_ed25519_work").is_some());
  assert!(manifest.exists());
}

#[test]
fn remove_with_yes_restores_shared_files() {
  let (env, manifest) = seeded("work");

  env
    .gitid_cmd()
    .args(["remove", "--alias", "work", "--yes"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Identity 'work' removed"));

  assert_eq!(env.read_home_file(".ssh/config").as_deref(), Some(SSH_PREAMBLE));
  assert_eq!(env.read_home_file(".gitconfig").as_deref(), Some(GIT_PREAMBLE));
  assert!(env.read_home_file(".gitconfig-work").is_none());
  assert!(env.read_home_file(".ssh/id_ed25519_work").is_none());
  assert!(env.read_home_file(".ssh/id_ed25519_work.pub").is_none());
  assert!(!manifest.exists());
}

#[test]
fn alias_lookup_is_case_insensitive() {
  let (env, manifest) = seeded("work");

  env
    .gitid_cmd()
    .args(["remove", "--alias", "WORK", "-y"])
    .assert()
    .success();

  assert!(!manifest.exists());
}

#[test]
fn remove_is_idempotent() {
  let (env, _manifest) = seeded("work");

  env
    .gitid_cmd()
    .args(["remove", "--alias", "work", "--yes"])
    .assert()
    .success();
  let ssh_after = env.read_home_file(".ssh/config");

  env
    .gitid_cmd()
    .args(["remove", "--alias", "work", "--yes"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to remove"));

  assert_eq!(env.read_home_file(".ssh/config"), ssh_after);
}

#[test]
fn remove_by_manifest_path() {
  let (env, manifest) = seeded("work");

  env
    .gitid_cmd()
    .arg("remove")
    .arg("--manifest")
    .arg(&manifest)
    .arg("--yes")
    .assert()
    .success();

  assert!(!manifest.exists());
  assert_eq!(env.read_home_file(".ssh/config").as_deref(), Some(SSH_PREAMBLE));
}

#[test]
fn unknown_alias_is_nothing_to_do() {
  let env = TestEnv::new();

  env
    .gitid_cmd()
    .args(["remove", "--alias", "ghost", "--yes"])
    .assert()
    .success()
    .stdout(predicate::str::contains("Nothing to remove"));
}

#[test]
fn missing_manifest_path_fails() {
  let env = TestEnv::new();
  let missing = env.data_path().join("nope.json");

  env
    .gitid_cmd()
    .arg("remove")
    .arg("--manifest")
    .arg(&missing)
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("error:"))
    .stderr(predicate::str::contains("manifest not found"));
}

#[test]
fn corrupt_manifest_fails_without_changes() {
  let (env, manifest) = seeded("work");
  fs::write(&manifest, "{ truncated").unwrap();
  let ssh_before = env.read_home_file(".ssh/config");

  env
    .gitid_cmd()
    .args(["remove", "--alias", "work", "--yes"])
    .assert()
    .failure()
    .code(1)
    .stderr(predicate::str::contains("corrupt"));

  assert_eq!(env.read_home_file(".ssh/config"), ssh_before);
  assert!(env.read_home_file(".ssh/id_ed25519_work").is_some());
}

#[test]
fn prompting_without_terminal_fails_safely() {
  let (env, manifest) = seeded("work");
  let ssh_before = env.read_home_file(".ssh/config");

  env
    .gitid_cmd()
    .args(["remove", "--alias", "work"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("--yes"));

  assert_eq!(env.read_home_file(".ssh/config"), ssh_before);
  assert!(manifest.exists());
}

#[test]
fn other_identities_survive() {
  let (env, _work) = seeded("work");
  let personal = env.seed_identity("personal");

  env
    .gitid_cmd()
    .args(["remove", "--alias", "work", "--yes"])
    .assert()
    .success();

  let ssh = env.read_home_file(".ssh/config").unwrap();
  assert!(ssh.contains("Host personal"));
  assert!(!ssh.contains("Host work"));
  assert!(env.read_home_file(".gitconfig-personal").is_some());
  assert!(personal.exists());
}
