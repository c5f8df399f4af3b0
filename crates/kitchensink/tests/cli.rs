//! End-to-end checks of the `kitchensink` binary that need no storage service

use std::process::Command;

fn kitchensink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_kitchensink"));
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_failed_command_reports_error_once() {
    let output = kitchensink()
        .args(["verify", "ftp://localhost", "ak", "sk", "dataset"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("invalid endpoint").count(), 1, "{}", stderr);
    assert!(stderr.contains("Error: "), "{}", stderr);
}

#[test]
fn test_version_prints_to_stdout() {
    let output = kitchensink().arg("version").output().unwrap();

    assert!(output.status.success());
    assert!(!output.stdout.is_empty());
}
