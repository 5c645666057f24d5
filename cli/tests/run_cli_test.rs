use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn script_file(source: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".weft")
        .tempfile()
        .expect("temp file");
    write!(file, "{source}").expect("write script");
    file
}

#[test]
fn test_runs_a_script_file() {
    let file = script_file("let x = 2;\nprint(x + 3);\nprint(\"done\");");
    Command::cargo_bin("weft")
        .unwrap()
        .arg(file.path())
        .assert()
        .success()
        .stdout("5\ndone\n");
}

#[test]
fn test_run_subcommand() {
    let file = script_file("for (i in 1..3) { print(i); }");
    Command::cargo_bin("weft")
        .unwrap()
        .args(["run"])
        .arg(file.path())
        .assert()
        .success()
        .stdout("1\n2\n3\n");
}

#[test]
fn test_compile_error_exits_nonzero() {
    let file = script_file("x = 1;");
    Command::cargo_bin("weft")
        .unwrap()
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("x is an undeclared identifier"));
}

#[test]
fn test_runtime_error_reports_line() {
    let file = script_file("let x = 1;\nx = 'a';");
    Command::cargo_bin("weft")
        .unwrap()
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: line 2:"));
}

#[test]
fn test_json_error_output() {
    let file = script_file("x = 1;");
    Command::cargo_bin("weft")
        .unwrap()
        .arg("--json")
        .arg(file.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"phase\":\"compile\""));
}

#[test]
fn test_disasm_lists_blocks() {
    let file = script_file("print(1);");
    Command::cargo_bin("weft")
        .unwrap()
        .args(["disasm"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("PushValue 1"))
        .stdout(predicate::str::contains("Normal"));
}

#[test]
fn test_missing_file_is_an_io_error() {
    Command::cargo_bin("weft")
        .unwrap()
        .arg("definitely-not-here.weft")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}
