//! Integration tests: run the seriate binary and check exit codes and output.

use std::io::Write;
use std::process::{Command, Output, Stdio};

fn seriate() -> Command {
    Command::new(env!("CARGO_BIN_EXE_seriate"))
}

fn run_with_stdin(args: &[&str], stdin: &str) -> Output {
    let mut child = seriate()
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    child
        .stdin
        .as_mut()
        .unwrap()
        .write_all(stdin.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn test_help() {
    let out = seriate().arg("--help").output().unwrap();
    assert!(out.status.success(), "seriate --help should succeed");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("bounded"));
}

#[test]
fn test_version() {
    let out = seriate().arg("--version").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("seriate") || stdout.contains("0.3"));
}

#[test]
fn test_run_preserves_input_order() {
    let out = run_with_stdin(
        &["run", "-q", "-j", "2", "--", "echo"],
        "alpha\nbeta\ngamma\ndelta\n",
    );
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(
        String::from_utf8_lossy(&out.stdout),
        "alpha\nbeta\ngamma\ndelta\n"
    );
}

#[test]
fn test_run_substitutes_placeholder() {
    let out = run_with_stdin(&["run", "-q", "--", "echo", "item-{}"], "x\ny\n");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "item-x\nitem-y\n");
}

#[test]
fn test_run_empty_input_succeeds() {
    let out = run_with_stdin(&["run", "-q", "--", "echo"], "");
    assert!(out.status.success());
    assert!(out.stdout.is_empty());
}

#[test]
fn test_run_failing_command_exits_nonzero() {
    let out = run_with_stdin(&["run", "-q", "--", "false"], "one\n");
    assert!(!out.status.success(), "failing command should abort the run");
}

#[test]
fn test_run_reads_input_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inputs.txt");
    std::fs::write(&path, "first\nsecond\nthird\n").unwrap();

    let out = seriate()
        .args(["run", "-q", "-i", path.to_str().unwrap(), "--", "echo"])
        .stdin(Stdio::null())
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(
        String::from_utf8_lossy(&out.stdout),
        "first\nsecond\nthird\n"
    );
}

#[test]
fn test_run_json_summary_on_stderr() {
    let out = run_with_stdin(&["run", "--json", "--", "echo"], "a\nb\n");
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout), "a\nb\n");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("schemaVersion"));
    assert!(stderr.contains("\"items\":2"));
}

#[test]
fn test_run_without_command_fails() {
    let out = run_with_stdin(&["run"], "");
    assert!(!out.status.success());
}
