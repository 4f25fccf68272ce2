//! CLI command integration tests.
//! Each test uses a temp directory via MOON_DATA_DIR for full isolation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn moon_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("moon").unwrap();
    cmd.env("MOON_DATA_DIR", data_dir.path());
    cmd
}

fn generate(dir: &TempDir, scope: &str) -> assert_cmd::assert::Assert {
    moon_cmd(dir)
        .args([
            "generate",
            "--from",
            "2016-09-03",
            "--to",
            "2016-09-05",
            "--scope",
            scope,
            "--workers",
            "2",
        ])
        .assert()
}

fn extract_stat_value<'a>(stdout: &'a str, label: &str) -> &'a str {
    stdout
        .lines()
        .find(|l| l.starts_with(label))
        .map(|l| l[label.len()..].trim())
        .unwrap_or("")
}

#[test]
fn stats_fresh_db() {
    let dir = TempDir::new().unwrap();
    moon_cmd(&dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("days:       0"))
        .stdout(predicate::str::contains("schema:     1"));
}

#[test]
fn generate_day_scope_then_stats() {
    let dir = TempDir::new().unwrap();
    generate(&dir, "day")
        .success()
        .stdout(predicate::str::contains("generated 3 days"))
        .stdout(predicate::str::contains("2016-09-04"));

    let output = moon_cmd(&dir).arg("stats").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(extract_stat_value(&stdout, "days:"), "3");
    assert_eq!(extract_stat_value(&stdout, "first:"), "2016-09-03");
    assert_eq!(extract_stat_value(&stdout, "last:"), "2016-09-05");
    assert_eq!(extract_stat_value(&stdout, "gaps:"), "0");
}

#[test]
fn generate_reuses_stored_days() {
    let dir = TempDir::new().unwrap();
    generate(&dir, "day").success();

    // Phase scope only needs the two padding days.
    generate(&dir, "phase")
        .success()
        .stdout(predicate::str::contains("generated 2 days"));
    generate(&dir, "phase")
        .success()
        .stdout(predicate::str::contains("generated 0 days"));
}

#[test]
fn generate_cycle_then_show_counts() {
    let dir = TempDir::new().unwrap();
    generate(&dir, "cycle")
        .success()
        .stdout(predicate::str::contains("generated"));

    let output = moon_cmd(&dir)
        .args(["show", "--from", "2016-09-03", "--to", "2016-09-05"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let rows: Vec<&str> = stdout.lines().filter(|l| l.starts_with("2016-")).collect();
    assert_eq!(rows.len(), 3);
    for row in rows {
        assert!(!row.ends_with('-'), "counts should be derived: {row}");
    }
}

#[test]
fn show_empty_range() {
    let dir = TempDir::new().unwrap();
    moon_cmd(&dir)
        .args(["show", "--from", "2020-01-01", "--to", "2020-01-02"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no stored days"));
}

#[test]
fn trim_removes_padding() {
    let dir = TempDir::new().unwrap();
    generate(&dir, "phase").success();

    // Day scope, from config, keeps only the range itself.
    std::fs::write(dir.path().join("moon.toml"), "[engine]\nscope = \"day\"\n").unwrap();
    moon_cmd(&dir)
        .args(["trim", "--from", "2016-09-03", "--to", "2016-09-05", "--future"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed 2 days"));

    moon_cmd(&dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("days:       3"));
}

#[test]
fn export_then_import() {
    let dir = TempDir::new().unwrap();
    generate(&dir, "day").success();

    let export_path = dir.path().join("days.json");
    moon_cmd(&dir)
        .arg("export")
        .arg(&export_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("exported 3 days"));

    let json = std::fs::read_to_string(&export_path).unwrap();
    assert!(json.contains("\"version\""));
    assert!(json.contains("\"lunarVisibility\""));

    let dir2 = TempDir::new().unwrap();
    moon_cmd(&dir2)
        .arg("import")
        .arg(&export_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported 3 days"));
    moon_cmd(&dir2)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("days:       3"));
}

#[test]
fn import_invalid_json_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(&path, "not json").unwrap();
    moon_cmd(&dir)
        .arg("import")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to import JSON"));
}

#[test]
fn unknown_config_key_fails() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("custom.toml");
    std::fs::write(&config, "[engine]\nthreads = 4\n").unwrap();
    moon_cmd(&dir)
        .arg("--config")
        .arg(&config)
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}

#[test]
fn bad_scope_rejected() {
    let dir = TempDir::new().unwrap();
    generate(&dir, "decade").failure();
}
