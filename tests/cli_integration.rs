//! Integration tests for the `shellx` binary.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

fn shellx(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shellx").unwrap();
    cmd.env_remove("SHELLX_CONFIG")
        .env("XDG_CONFIG_HOME", dir.path().join("xdg"))
        .env("HOME", dir.path())
        .arg("--cwd")
        .arg(dir.path());
    cmd
}

fn fixture() -> TempDir {
    let temp = TempDir::new().unwrap();
    temp.child("notes").create_dir_all().unwrap();
    temp.child("notes/todo.txt").write_str("buy milk\n").unwrap();
    temp.child("readme.md").write_str("# hi\n").unwrap();
    temp
}

#[test]
fn version_flag() {
    Command::cargo_bin("shellx")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("shellx"));
}

#[test]
fn run_prints_listing() {
    let temp = fixture();
    shellx(&temp)
        .args(["run", "lsx"])
        .assert()
        .success()
        .stdout(predicate::str::contains("notes/").and(predicate::str::contains("readme.md")));
}

#[test]
fn run_accepts_separate_words() {
    let temp = fixture();
    shellx(&temp)
        .args(["run", "cat", "notes/todo.txt"])
        .assert()
        .success()
        .stdout("buy milk\n");
}

#[test]
fn run_error_exits_nonzero() {
    let temp = fixture();
    shellx(&temp)
        .args(["run", "lsx missing"])
        .assert()
        .failure()
        .stdout("[ERROR]: Directory not found: missing\n");
}

#[test]
fn unknown_command_exits_nonzero() {
    let temp = fixture();
    shellx(&temp)
        .args(["run", "frobnicate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Unknown command: frobnicate"));
}

#[test]
fn json_mode_flag() {
    let temp = fixture();
    let output = shellx(&temp)
        .args(["--mode", "json", "run", "info readme.md"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(document["type"], "keyValue");
    assert_eq!(document["metadata"]["title"], "File Information");
}

#[test]
fn plan_prints_json() {
    let temp = fixture();
    let output = shellx(&temp).args(["plan", "lsx notes --long"]).output().unwrap();
    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["dryRun"], true);
    assert_eq!(plan["steps"][0]["id"], "read-dir");
    assert_eq!(plan["steps"][0]["params"]["long"], true);
}

#[test]
fn plan_of_unknown_command_fails() {
    let temp = fixture();
    shellx(&temp)
        .args(["plan", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown command: nope"));
}

#[test]
fn export_lists_builtins() {
    let temp = fixture();
    let output = shellx(&temp).arg("export").output().unwrap();
    assert!(output.status.success());
    let defs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = defs
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["name"].as_str())
        .collect();
    assert!(names.contains(&"lsx"));
    assert!(names.contains(&"help"));
}

#[test]
fn repl_reads_stdin_until_exit() {
    let temp = fixture();
    shellx(&temp)
        .write_stdin("cd notes\npwd\nexit\nlsx\n")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Goodbye!")
                .and(predicate::str::contains("~/notes> "))
                .and(predicate::str::contains("todo.txt").not()),
        );
}

#[test]
fn config_file_sets_mode() {
    let temp = fixture();
    temp.child("shellx.toml")
        .write_str("[presentation]\nmode = \"json\"\n")
        .unwrap();
    let output = shellx(&temp)
        .arg("--config")
        .arg(temp.path().join("shellx.toml"))
        .args(["run", "pwd"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let document: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(document["type"], "text");
}

#[test]
fn bad_config_is_reported() {
    let temp = fixture();
    temp.child("bad.toml").write_str("[presentation]\nloud = true\n").unwrap();
    shellx(&temp)
        .arg("--config")
        .arg(temp.path().join("bad.toml"))
        .args(["run", "pwd"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn completion_script() {
    Command::cargo_bin("shellx")
        .unwrap()
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("shellx"));
}
