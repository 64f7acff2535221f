//! End-to-end smoke tests for the `polypm` binary's argument parsing and
//! error reporting. Network-touching scenarios (actual resolution against
//! a registry) are covered at the registry-client level with mockito
//! fixtures; these tests only exercise the CLI surface itself.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn rejects_a_package_ref_with_no_ecosystem_prefix() {
    let mut cmd = Command::cargo_bin("polypm").unwrap();
    cmd.arg("just-a-name").arg("--resolve-only");
    cmd.assert().failure().stderr(predicate::str::contains("missing ecosystem prefix"));
}

#[test]
fn rejects_an_unknown_ecosystem_prefix() {
    let mut cmd = Command::cargo_bin("polypm").unwrap();
    cmd.arg("cargo:serde@1").arg("--resolve-only");
    cmd.assert().failure().stderr(predicate::str::contains("unknown ecosystem"));
}

#[test]
fn rejects_an_unknown_architecture() {
    let mut cmd = Command::cargo_bin("polypm").unwrap();
    cmd.arg("pypi:requests").arg("--arch").arg("sparc64").arg("--resolve-only");
    cmd.assert().failure().stderr(predicate::str::contains("unknown arch"));
}

#[test]
fn requires_at_least_one_package_argument() {
    let mut cmd = Command::cargo_bin("polypm").unwrap();
    cmd.assert().failure();
}
