use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Env {
    temp: TempDir,
}

impl Env {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = temp.path();

        fs::create_dir_all(root.join("profiles/default/python")).unwrap();
        fs::create_dir_all(root.join("share")).unwrap();
        fs::write(root.join("profiles/default/QGIS3.ini"), "[qgis]\nlocale=en\n").unwrap();
        fs::write(root.join("profiles/default/python/startup.py"), "pass\n").unwrap();

        let config = format!(
            "# test configuration\n\
             ACTIVE_SCENARIO=Alpha\n\
             PROCESS_KILL_DELAY_MS=0\n\
             \n\
             [Alpha]\n\
             SOURCE_PATH={}\n\
             TARGET_SHARE={}\n\
             PROCESS_NAMES=profilecopy-test-no-such-process\n\
             ZIP_POSTFIX=Alpha\n\
             SCENARIO_TITLE=Alpha Team\n\
             \n\
             [Beta]\n\
             SOURCE_PATH={}\n\
             TARGET_SHARE={}\n",
            root.join("profiles").display(),
            root.join("share").display(),
            root.join("profiles").display(),
            root.join("share").display(),
        );
        fs::write(root.join("host.local"), config).unwrap();

        Self { temp }
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn user_dir(&self) -> PathBuf {
        self.root().join("share/tester")
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("profilecopy").unwrap();
        cmd.env("PROFILECOPY_CONFIG", self.root().join("host.local"))
            .env("PROFILECOPY_LOG_DIR", self.root().join("logs"))
            .env("USERNAME", "tester");
        cmd
    }

    fn create_backup(&self, version: &str) {
        self.cmd()
            .args(["create", "--version", version])
            .assert()
            .success()
            .stdout(predicate::str::contains("Backup created: QGISProfiles_Alpha_"));
    }

    fn archives(&self) -> Vec<String> {
        fs::read_dir(self.user_dir())
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[test]
fn test_config_shows_active_scenario() {
    let env = Env::new();

    env.cmd()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Active scenario:  Alpha"))
        .stdout(predicate::str::contains("User name:     tester"))
        .stdout(predicate::str::contains(
            env.user_dir().display().to_string(),
        ))
        .stdout(predicate::str::contains("postfix 'Alpha'"));
}

#[test]
fn test_scenarios_marks_active() {
    let env = Env::new();

    env.cmd()
        .arg("scenarios")
        .assert()
        .success()
        .stdout(predicate::str::contains("* Alpha"))
        .stdout(predicate::str::contains("  Beta"));
}

#[test]
fn test_list_empty_share() {
    let env = Env::new();

    env.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups found."));

    // The user folder is provisioned on first listing
    assert!(env.user_dir().is_dir());
}

#[test]
fn test_create_writes_archive_to_user_folder() {
    let env = Env::new();

    env.create_backup("3.34");

    let archives = env.archives();
    assert_eq!(archives.len(), 1);
    assert!(archives[0].starts_with("QGISProfiles_Alpha_3.34_"));
    assert!(archives[0].ends_with(".zip"));
}

#[test]
fn test_create_rejects_blank_version() {
    let env = Env::new();

    env.cmd()
        .args(["create", "--version", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Version must not be empty"));

    assert!(env.archives().is_empty());
}

#[test]
fn test_create_requires_version() {
    let env = Env::new();

    env.cmd().arg("create").assert().failure();
}

#[test]
fn test_kill_requires_force() {
    let env = Env::new();

    env.cmd()
        .args(["create", "--version", "3.34", "--kill"])
        .assert()
        .success()
        .stdout(predicate::str::contains("run again with --force"));

    assert!(env.archives().is_empty());
}

#[test]
fn test_list_filters_by_scenario() {
    let env = Env::new();
    env.create_backup("3.34");
    fs::write(
        env.user_dir().join("QGISProfiles_Beta_3.28_20230101-0800.zip"),
        b"PK",
    )
    .unwrap();

    env.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("3.34"))
        .stdout(predicate::str::contains("3.28").not());

    env.cmd()
        .args(["list", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3.28"))
        .stdout(predicate::str::contains("Other scenario"));
}

#[test]
fn test_list_json() {
    let env = Env::new();
    env.create_backup("3.34");

    let output = env
        .cmd()
        .args(["list", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let records = value["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["version"], "3.34");
    assert_eq!(records[0]["scenario"], "Alpha");
    assert_eq!(value["summary"]["total"], 1);
}

#[test]
fn test_restore_requires_force() {
    let env = Env::new();
    env.create_backup("3.34");
    let ini = env.root().join("profiles/default/QGIS3.ini");
    fs::write(&ini, "changed").unwrap();

    env.cmd()
        .args(["restore", "latest"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup Information"))
        .stdout(predicate::str::contains("run again with --force"));

    assert_eq!(fs::read_to_string(&ini).unwrap(), "changed");
}

#[test]
fn test_restore_latest_round_trip() {
    let env = Env::new();
    env.create_backup("3.34");

    let ini = env.root().join("profiles/default/QGIS3.ini");
    fs::write(&ini, "changed").unwrap();
    fs::write(env.root().join("profiles/default/extra.txt"), "extra").unwrap();

    env.cmd()
        .args(["restore", "latest", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Restore complete!"))
        .stdout(predicate::str::contains("Previous profile saved to:"));

    assert_eq!(fs::read_to_string(&ini).unwrap(), "[qgis]\nlocale=en\n");
    assert!(!env.root().join("profiles/default/extra.txt").exists());
    assert!(env.root().join("profiles/default/python/startup.py").exists());

    let snapshots: Vec<_> = fs::read_dir(env.root())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("profiles_Snapshot_"))
        .collect();
    assert_eq!(snapshots.len(), 1);
    assert!(snapshots[0].path().join("default/extra.txt").exists());
}

#[test]
fn test_restore_by_file_name_without_snapshot() {
    let env = Env::new();
    env.create_backup("3.34");
    let name = env.archives().remove(0);
    let target = env.root().join("restored");

    env.cmd()
        .args(["restore", &name, "--force", "--no-snapshot", "--target"])
        .arg(&target)
        .assert()
        .success();

    assert!(target.join("default/QGIS3.ini").is_file());
    let snapshots = fs::read_dir(env.root())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().contains("_Snapshot_"))
        .count();
    assert_eq!(snapshots, 0);
}

#[test]
fn test_restore_unknown_backup() {
    let env = Env::new();

    env.cmd()
        .args(["restore", "nope.zip", "--force"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Backup not found: nope.zip"));
}

#[test]
fn test_unknown_scenario() {
    let env = Env::new();

    env.cmd()
        .args(["list", "--scenario", "Gamma"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Scenario not found: Gamma"));
}

#[test]
fn test_log_records_operations() {
    let env = Env::new();
    env.create_backup("3.34");

    env.cmd()
        .args(["log", "--tail", "50"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Backup -> Completed"));
}

#[test]
fn test_missing_config_file_flag() {
    let env = Env::new();

    env.cmd()
        .args(["config", "--config"])
        .arg(env.root().join("missing.local"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"));
}
