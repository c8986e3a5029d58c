use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Build a minimal valid TOML config for sim mode
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[pins]
# pins are unused in sim backend but must be present
motor_step = 23
motor_dir = 24
motor_en = 25
limit_in = 17
hall_in = 27
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "ok", "stdout")]
#[case(&["home"], 0, "homed at logical position 0", "stdout")]
#[case(&["lookup", "--table", "erg", "--speed", "10", "--at", "200"], 0, "position = 442", "stdout")]
#[case(&["lookup", "--table", "power", "--speed", "60", "--at", "500"], 0, "power_w = 0", "stdout")]
#[case(&["ride", "--duration-s", "5", "--mode", "erg", "--watts", "200"], 0, "mode=erg", "stdout")]
#[case(&["lookup", "--table", "erg", "--speed", "10"], 2, "required", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("trainer").unwrap();

    // Always include a valid config to avoid relying on default path
    cmd.arg("--config").arg(&cfg);

    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);

    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn cli_rejects_invalid_config() {
    let dir = tempdir().unwrap();
    let toml = r#"
[pins]
motor_step = 23
motor_dir = 24
limit_in = 17
hall_in = 27

[motion]
min_sps = 500.0
max_sps = 100.0
"#;
    let path = dir.path().join("bad.toml");
    fs::write(&path, toml).unwrap();

    let mut cmd = Command::cargo_bin("trainer").unwrap();
    cmd.arg("--config").arg(&path).arg("self-check");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("max_sps"));
}

#[rstest]
fn ride_persists_settings_between_runs() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let settings = dir.path().join("settings");

    let mut first = Command::cargo_bin("trainer").unwrap();
    first
        .arg("--config")
        .arg(&cfg)
        .args(["ride", "--duration-s", "2"])
        .arg("--settings-dir")
        .arg(&settings);
    first.assert().success();

    // Saved tables land as one file per key.
    assert!(settings.join("powerTbl").exists());
    assert!(settings.join("idleB").exists());

    let mut second = Command::cargo_bin("trainer").unwrap();
    second
        .arg("--config")
        .arg(&cfg)
        .args(["ride", "--duration-s", "2"])
        .arg("--settings-dir")
        .arg(&settings);
    second.assert().success();
}
