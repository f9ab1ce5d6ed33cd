//! CLI structure and argument parsing.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn vagrantp() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vagrantp"));
    cmd.env("NO_COLOR", "1").env_remove("VAGRANTP_CONFIG");
    cmd
}

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    vagrantp().assert().code(2).stderr(predicate::str::contains(
        "Declarative single-instance development infrastructure",
    ));
}

#[test]
fn test_cli_help_lists_commands() {
    let assert = vagrantp().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    for command in ["up", "ssh", "stop", "rm", "status", "provision", "version"] {
        assert!(stdout.contains(command), "help is missing {command}:\n{stdout}");
    }
}

#[test]
fn test_cli_version_flag_shows_version() {
    vagrantp()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vagrantp"));
}

#[test]
fn test_version_command_shows_version() {
    vagrantp()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(format!(
            "vagrantp {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn test_up_help_shows_flags() {
    vagrantp()
        .args(["up", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--no-provision"));
}

#[test]
fn test_ssh_help_shows_command_option() {
    vagrantp()
        .args(["ssh", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--command"));
}

#[test]
fn test_stop_and_rm_accept_force() {
    for command in ["stop", "rm"] {
        vagrantp()
            .args([command, "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--force"));
    }
}

#[test]
fn test_unknown_command_is_usage_error() {
    vagrantp()
        .arg("destroy-everything")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_cli_accepts_any_no_color_value() {
    for value in ["1", "yes", "true", ""] {
        vagrantp()
            .env("NO_COLOR", value)
            .arg("version")
            .assert()
            .success()
            .stdout(predicate::str::contains("vagrantp"));
    }
    vagrantp()
        .env_remove("NO_COLOR")
        .args(["--no-color", "version"])
        .assert()
        .success();
}
