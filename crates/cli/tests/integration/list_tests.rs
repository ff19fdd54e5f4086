//! List command integration tests.

use predicates::prelude::*;

use super::common::TestEnv;

#[test]
fn list_shows_seeded_identity() {
  let env = TestEnv::new();
  env.seed_identity("work");

  env
    .gitid_cmd()
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("work"))
    .stdout(predicate::str::contains("alice <alice@example.com> on github.com"))
    .stdout(predicate::str::contains("2023-11-14T22:13:20Z"));
}

#[test]
fn list_json_output() {
  let env = TestEnv::new();
  env.seed_identity("work");
  env.seed_identity("personal");

  let output = env.gitid_cmd().args(["list", "-o", "json"]).output().unwrap();
  assert!(output.status.success());

  let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let aliases: Vec<&str> = parsed
    .as_array()
    .unwrap()
    .iter()
    .map(|v| v["alias"].as_str().unwrap())
    .collect();
  assert_eq!(aliases.len(), 2);
  assert!(aliases.contains(&"work"));
  assert!(aliases.contains(&"personal"));
  assert_eq!(parsed[0]["uploaded"], false);
}

#[test]
fn list_skips_corrupt_manifest() {
  let env = TestEnv::new();
  let manifest = env.seed_identity("work");
  std::fs::write(&manifest, "not json").unwrap();

  env
    .gitid_cmd()
    .arg("list")
    .assert()
    .success()
    .stderr(predicate::str::contains("Skipping"))
    .stdout(predicate::str::contains("No identities provisioned"));
}
