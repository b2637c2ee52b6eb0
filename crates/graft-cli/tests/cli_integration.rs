//! Integration tests for the `graft` binary.
//!
//! Scenarios are built with the engine API, written to a temp dir, and fed
//! to the binary.

use graft_engine::{DeclId, Program, TypeContext};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::Path;
use std::process::{Command, Output};

fn graft(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_graft"))
        .args(args)
        .current_dir(cwd)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run graft")
}

/// `S { int a; }`, an empty class `T`, and requests injecting `a` into `T`
/// and into the translation unit
fn write_scenario(dir: &Path) -> std::path::PathBuf {
    let mut program = Program::new();
    let s = program.add_class(DeclId::TRANSLATION_UNIT, "S");
    let a = program.add_field(s, "a", TypeContext::INT, None);
    let t = program.add_class(DeclId::TRANSLATION_UNIT, "T");
    let expr = program.build_reflection(a);

    let scenario = json!({
        "program": program,
        "requests": [
            { "point": { "line": 3, "column": 1 }, "target": t, "expr": expr },
            { "target": DeclId::TRANSLATION_UNIT, "expr": expr },
        ],
    });
    let path = dir.join("scenario.json");
    std::fs::write(&path, serde_json::to_string_pretty(&scenario).unwrap()).unwrap();
    path
}

// ────────────────────────────────────────────────────────────────────────────
// graft print
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_print_shows_program() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scenario(dir.path());

    let output = graft(&["print", path.to_str().unwrap()], dir.path());
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("class S {"), "stdout: {}", stdout);
    assert!(stdout.contains("public int a;"), "stdout: {}", stdout);
    assert!(stdout.contains("2 pending request(s)"), "stdout: {}", stdout);
}

// ────────────────────────────────────────────────────────────────────────────
// graft inject
// ────────────────────────────────────────────────────────────────────────────

#[test]
fn test_inject_json_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scenario(dir.path());

    let output = graft(&["inject", path.to_str().unwrap(), "--format", "json"], dir.path());
    assert_eq!(output.status.code(), Some(1));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["ok"], json!(false));
    assert_eq!(report["outcomes"][0]["status"], json!("applied"));
    assert_eq!(report["outcomes"][1]["status"], json!("failed"));
    assert_eq!(report["diagnostics"][0]["class"], json!(1));
    assert_eq!(report["diagnostics"][0]["severity"], json!("error"));
}

#[test]
fn test_inject_pretty_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scenario(dir.path());

    let output = graft(&["inject", path.to_str().unwrap()], dir.path());
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("request 0: applied (1 declaration(s))"), "stdout: {}", stdout);
    assert!(stdout.contains("public int a;"), "stdout: {}", stdout);
    assert!(stdout.contains("request 1: failed"), "stdout: {}", stdout);
    assert!(stdout.contains("batch failed"), "stdout: {}", stdout);
}

#[test]
fn test_config_in_working_directory_selects_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scenario(dir.path());
    std::fs::write(dir.path().join("graft.toml"), "[output]\nformat = \"json\"\n").unwrap();

    let output = graft(&["print", path.to_str().unwrap()], dir.path());
    assert!(output.status.success());
    let program: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(program.get("decls").is_some());
}

#[test]
fn test_missing_scenario_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = graft(&["inject", "nope.json"], dir.path());
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read scenario"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scenario(dir.path());
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "[inject]\nmax_eval_depth = \"deep\"\n").unwrap();

    let output = graft(
        &["--config", config.to_str().unwrap(), "print", path.to_str().unwrap()],
        dir.path(),
    );
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid config"));
}

#[test]
fn test_inconsistent_snapshot_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_scenario(dir.path());
    let mut scenario: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    scenario["program"]["decls"][1]["members"] = json!([999]);
    std::fs::write(&path, serde_json::to_string(&scenario).unwrap()).unwrap();

    let output = graft(&["inject", path.to_str().unwrap()], dir.path());
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown declaration #999"), "stderr: {}", stderr);
}
