//! Configuration loading and validation through the binary.

#![allow(clippy::expect_used)]

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn vagrantp(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vagrantp"));
    cmd.current_dir(dir)
        .env("NO_COLOR", "1")
        .env_remove("VAGRANTP_CONFIG");
    cmd
}

fn project(env: &str) -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join(".env"), env).expect("write .env");
    dir
}

#[test]
fn test_missing_config_exits_with_config_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    vagrantp(dir.path())
        .arg("up")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not found"))
        .stderr(predicate::str::contains("→"));
}

#[test]
fn test_missing_infra_kind_is_reported() {
    let dir = project("memory=2G\n");
    vagrantp(dir.path())
        .args(["up", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("infra_kind is required"));
}

#[test]
fn test_small_container_memory_fails() {
    let dir = project("infra_kind=container\nmemory=256\n");
    vagrantp(dir.path())
        .args(["up", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("at least 512MB"));
}

#[test]
fn test_all_errors_reported_together() {
    let dir = project("INFRA_TYPE=vm\nMEMORY=2X\nCPUS=zero\nPORTS=8080\nIP_ADDRESS=300.1.1.1\n");
    vagrantp(dir.path())
        .args(["up", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("backend_name is required"))
        .stderr(predicate::str::contains("Invalid MEMORY format: 2X"))
        .stderr(predicate::str::contains("Invalid cpu_count value: zero"))
        .stderr(predicate::str::contains("Invalid PORTS mapping: 8080"))
        .stderr(predicate::str::contains("Invalid static_ip format: 300.1.1.1"));
}

#[test]
fn test_dry_run_prints_normalized_settings() {
    let dir = project(
        "infra_kind=vm\nbackend_name=virtualbox\nmemory=2G\ncpus=2\ndisk_size=20G\n\
         ports=8080:80,auto:443\n",
    );
    vagrantp(dir.path())
        .args(["up", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2048 MB"))
        .stdout(predicate::str::contains("20 GB"))
        .stdout(predicate::str::contains("auto → 443"))
        .stdout(predicate::str::contains("Dry run"));
}

#[test]
fn test_container_disk_size_is_a_warning() {
    let dir = project("infra_kind=container\ndisk_size=10G\n");
    vagrantp(dir.path())
        .args(["up", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("disk_size is not applicable"));
}

#[test]
fn test_quiet_dry_run_prints_nothing() {
    let dir = project("infra_kind=container\n");
    vagrantp(dir.path())
        .args(["-q", "up", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_missing_playbook_is_an_error() {
    let dir = project("infra_kind=container\nplaybook_path=site.yml\n");
    vagrantp(dir.path())
        .args(["up", "--dry-run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("playbook_path not found: site.yml"));
}

#[test]
fn test_playbook_resolves_against_project_dir() {
    let dir = project("infra_kind=container\nplaybook_path=provision/site.yml\n");
    std::fs::create_dir(dir.path().join("provision")).expect("mkdir");
    std::fs::write(dir.path().join("provision/site.yml"), "- hosts: all\n").expect("write");
    vagrantp(dir.path())
        .args(["up", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("site.yml"));
}

#[test]
fn test_config_flag_overrides_default_file() {
    let dir = project("memory=1\n");
    std::fs::write(dir.path().join("dev.env"), "infra_kind=container\n").expect("write");
    vagrantp(dir.path())
        .args(["--config", "dev.env", "up", "--dry-run"])
        .assert()
        .success();
}

#[test]
fn test_config_env_var_overrides_default_file() {
    let dir = project("memory=1\n");
    std::fs::write(dir.path().join("dev.env"), "infra_kind=container\n").expect("write");
    vagrantp(dir.path())
        .env("VAGRANTP_CONFIG", "dev.env")
        .args(["up", "--dry-run"])
        .assert()
        .success();
}

#[test]
fn test_stale_config_does_not_block_instance_commands() {
    // No Vagrantfile, so the VM reads as not created without calling vagrant.
    let dir = project("infra_kind=vm\nbackend_name=virtualbox\nplaybook_path=site.yml\nmemory=1\n");
    for args in [&["stop"][..], &["rm", "--force"], &["status"]] {
        vagrantp(dir.path()).args(args).assert().success();
    }
    vagrantp(dir.path())
        .arg("status")
        .assert()
        .stdout(predicate::str::contains("not_created"));
}

#[test]
fn test_up_and_provision_still_validate_fully() {
    let dir = project("infra_kind=vm\nbackend_name=virtualbox\nplaybook_path=site.yml\n");
    for command in ["up", "provision"] {
        vagrantp(dir.path())
            .arg(command)
            .assert()
            .code(2)
            .stderr(predicate::str::contains("playbook_path not found"));
    }
}

#[test]
fn test_instance_commands_need_infra_kind() {
    let dir = project("memory=2G\n");
    for command in ["status", "stop", "ssh"] {
        vagrantp(dir.path())
            .arg(command)
            .assert()
            .code(2)
            .stderr(predicate::str::contains("infra_kind is required"));
    }
}
