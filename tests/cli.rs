//! Integration tests for the command line interface

mod common;

use assert_cmd::Command;
use common::{create_test_profile, SAMPLE_PROFILE};
use predicates::prelude::*;
use tempfile::TempDir;

const SINGLE_TASK_PROFILE: &str = r#"{
  "tasks": [{"id": 4, "name": "trace", "action": 1}],
  "template": {
    "actions": [{
      "id": 1,
      "name": "wpr",
      "executable": "wpr.exe",
      "arguments": [{"command": "-start", "value": "{profile}"}],
      "property": 1,
      "output": "trace.log"
    }],
    "action_properties": [{"id": 1, "timeout_sec": 10}]
  },
  "variables": [{"alias": "profile", "value": "GeneralProfile"}]
}"#;

fn delegator() -> Command {
    let mut cmd = Command::cargo_bin("delegator").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help() {
    delegator()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn test_validate_ok() {
    let (_dir, path) = create_test_profile("profile.json", SAMPLE_PROFILE);
    delegator()
        .arg("-f")
        .arg(&path)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 tasks"));
}

#[test]
fn test_validate_reports_duplicate_ids() {
    let json = r#"{"template": {"actions": [{"id": 1}, {"id": 1}]}}"#;
    let (_dir, path) = create_test_profile("profile.json", json);
    delegator()
        .arg("-f")
        .arg(&path)
        .arg("validate")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("Duplicate action id 1"));
}

#[test]
fn test_validate_checks_interpolated_executable() {
    let json = r#"{
  "template": {"actions": [{"id": 1, "name": "trace", "executable": "{tool}"}]},
  "variables": [{"alias": "tool", "value": "wpr.exe"}]
}"#;
    let (_dir, path) = create_test_profile("profile.json", json);
    delegator()
        .arg("-f")
        .arg(&path)
        .arg("validate")
        .assert()
        .success()
        .stderr(predicate::str::contains("allow-list").not());
}

#[test]
fn test_validate_logs_disallowed_executable() {
    let json = r#"{
  "template": {"actions": [{"id": 1, "name": "shell", "executable": "{tool}"}]},
  "variables": [{"alias": "tool", "value": "cmd.exe"}]
}"#;
    let (_dir, path) = create_test_profile("profile.json", json);
    delegator()
        .arg("-f")
        .arg(&path)
        .arg("validate")
        .assert()
        .success()
        .stderr(predicate::str::contains("allow-list"))
        .stderr(predicate::str::contains("cmd.exe"));
}

#[test]
fn test_validate_discovers_profile() {
    let (dir, _path) = create_test_profile("profile.json", SAMPLE_PROFILE);
    delegator()
        .current_dir(dir.path())
        .arg("validate")
        .assert()
        .success();
}

#[test]
fn test_list_tasks() {
    let (_dir, path) = create_test_profile("profile.json", SAMPLE_PROFILE);
    delegator()
        .args(["list", "-f"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("cpu trace"))
        .stdout(predicate::str::contains("busy agent"))
        .stdout(predicate::str::contains("dsa query"));
}

#[test]
fn test_run_unknown_task() {
    let (_dir, path) = create_test_profile("profile.json", SINGLE_TASK_PROFILE);
    delegator()
        .arg("-f")
        .arg(&path)
        .args(["run", "--task", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Task 9 is not defined"));
}

#[cfg(unix)]
#[test]
fn test_run_with_echo_executor() {
    let (_dir, path) = create_test_profile("profile.json", SINGLE_TASK_PROFILE);
    let out = TempDir::new().unwrap();

    delegator()
        .arg("-f")
        .arg(&path)
        .args(["run", "--executor", "echo", "--output-dir"])
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("FinishWithSuccessful"));

    let captured = std::fs::read_to_string(out.path().join("trace.log")).unwrap();
    assert_eq!(captured, "-w -start GeneralProfile\n");
}

#[cfg(unix)]
#[test]
fn test_run_failing_tool_exits_non_zero() {
    let (_dir, path) = create_test_profile("profile.json", SINGLE_TASK_PROFILE);
    let out = TempDir::new().unwrap();

    delegator()
        .arg("-f")
        .arg(&path)
        .args(["--quiet", "run", "--task", "4", "--executor", "false", "--output-dir"])
        .arg(out.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("FinishWithFailed"));
}
