//! Behaviour of the `upkeep` binary that does not need a release host.
//!
//! Every run gets its own configuration file so the developer's
//! `~/.upkeep/config.toml` never leaks in. Network-bound runs point the API
//! at a closed local port.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
    config: PathBuf,
}

impl Sandbox {
    fn new(config: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, config).unwrap();
        Self {
            dir,
            config: path,
        }
    }

    /// API on a port nothing listens on; connections fail immediately.
    fn offline() -> Self {
        Self::new("github_api_url = \"http://127.0.0.1:9\"\nversion_check_timeout_secs = 2\n")
    }

    fn upkeep(&self) -> Command {
        let mut cmd = Command::cargo_bin("upkeep").unwrap();
        cmd.env_remove("UPKEEP_CONFIG_PATH")
            .env_remove("RUST_LOG")
            .env("UPKEEP_NO_PROGRESS", "1")
            .arg("--config")
            .arg(&self.config);
        cmd
    }
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("upkeep")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("extract"));
}

#[test]
fn test_verbose_and_quiet_conflict() {
    let sandbox = Sandbox::offline();
    sandbox.upkeep().args(["--verbose", "--quiet", "check", "nuclei"]).assert().failure().code(2);
}

#[test]
fn test_invalid_current_version_is_rejected_before_network() {
    let sandbox = Sandbox::offline();
    let target = sandbox.dir.path().join("nuclei");
    fs::write(&target, b"nuclei").unwrap();

    sandbox
        .upkeep()
        .args(["update", "nuclei", "--current-version", "not-a-version", "--target"])
        .arg(&target)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Invalid semantic version 'not-a-version'"))
        .stderr(predicate::str::contains("suggestion"));

    assert_eq!(fs::read(&target).unwrap(), b"nuclei");
}

#[test]
fn test_unreachable_release_host() {
    let sandbox = Sandbox::offline();
    sandbox
        .upkeep()
        .args(["--quiet", "check", "nuclei", "--repo", "projectdiscovery/nuclei"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("fetch latest release of projectdiscovery/nuclei"))
        .stderr(predicate::str::contains("safe to retry"));
}

#[test]
fn test_update_against_unreachable_host_leaves_executable() {
    let sandbox = Sandbox::offline();
    let target = sandbox.dir.path().join("nuclei");
    fs::write(&target, b"nuclei 3.0.0").unwrap();

    sandbox
        .upkeep()
        .args(["update", "nuclei", "--current-version", "3.0.0", "--target"])
        .arg(&target)
        .assert()
        .failure();

    assert_eq!(fs::read(&target).unwrap(), b"nuclei 3.0.0");
    let mut names: Vec<String> = fs::read_dir(sandbox.dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["config.toml".to_string(), "nuclei".to_string()]);
}

#[test]
fn test_malformed_repository() {
    let sandbox = Sandbox::offline();
    sandbox
        .upkeep()
        .args(["check", "nuclei", "--repo", "a/b/c"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid repository identifier 'a/b/c'"));
}

#[test]
fn test_broken_config_file() {
    let sandbox = Sandbox::new("version_check_timeout_secs = \"soon\"\n");
    sandbox
        .upkeep()
        .args(["check", "nuclei"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_zero_timeout_is_rejected() {
    let sandbox = Sandbox::new("download_timeout_secs = 0\n");
    sandbox
        .upkeep()
        .args(["extract", "nuclei-templates", "--dir"])
        .arg(sandbox.dir.path().join("templates"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("download_timeout_secs must be greater than zero"));
}
