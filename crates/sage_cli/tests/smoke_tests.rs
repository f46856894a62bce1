//! CLI smoke tests: drive the compiled `sage` binary.

use std::process::Command;

fn cli_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_sage"));
    cmd.env_remove("OPENAI_API_KEY").env("LLM_PROVIDER", "mock");
    cmd
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"));
    assert!(stdout.contains("serve"));
    assert!(stdout.contains("eval"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("sage"));
}

#[test]
fn test_ask_with_mock_provider() {
    let output = cli_bin()
        .args(["--config", "/tmp/nonexistent_sage_config_12345.toml"])
        .args(["ask", "Who wrote Hamlet?"])
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("I received: Who wrote Hamlet?"));
}

#[test]
fn test_ask_show_reasoning() {
    let output = cli_bin()
        .args(["ask", "--show-reasoning", "ping"])
        .output()
        .expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Thought: I can answer without using any more tools."));
}

#[test]
fn test_eval_writes_results() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("questions.txt");
    let output = dir.path().join("results.jsonl");
    std::fs::write(&input, "first question\nsecond question\n").unwrap();

    let status = cli_bin()
        .arg("eval")
        .arg("--input")
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .status()
        .expect("failed to run");
    assert!(status.success());

    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written.lines().count(), 2);
}

#[test]
fn test_unknown_provider_fails_cleanly() {
    let output = cli_bin()
        .env("LLM_PROVIDER", "nope")
        .args(["ask", "hi"])
        .output()
        .expect("failed to run");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope"));
}
