//! Real child processes through the system runner.

#![cfg(unix)]

use cookout_core::DeployError;
use cookout_core::runner::{ExecContext, Invocation, SystemRunner};
use tempfile::TempDir;

fn sh(script: &str) -> Invocation {
    Invocation::new("sh").args(["-c", script])
}

fn run(invocation: &Invocation, ctx: &ExecContext) -> (cookout_core::Result<String>, String) {
    let mut echo = Vec::new();
    let result = SystemRunner::new().run_with_echo(invocation, ctx, &mut echo);
    (result, String::from_utf8(echo).unwrap())
}

#[test]
fn captures_stdout_lines_in_order() {
    let temp = TempDir::new().unwrap();
    let (result, echo) = run(
        &sh("echo one; echo two; echo three"),
        &ExecContext::new(temp.path()),
    );

    assert_eq!(result.unwrap(), "one\ntwo\nthree");
    assert_eq!(echo, "one\ntwo\nthree\n");
}

#[test]
fn stderr_is_not_captured() {
    let temp = TempDir::new().unwrap();
    let (result, echo) = run(
        &sh("echo out; echo noise 1>&2; echo more"),
        &ExecContext::new(temp.path()),
    );

    assert_eq!(result.unwrap(), "out\nmore");
    assert!(!echo.contains("noise"));
}

#[test]
fn invalid_utf8_output_does_not_fail_successful_command() {
    let temp = TempDir::new().unwrap();
    let (result, echo) = run(
        &sh("printf 'ok\\n\\377caf\\351\\n'; printf 'warn \\377\\n' 1>&2; exit 0"),
        &ExecContext::new(temp.path()),
    );

    assert_eq!(result.unwrap(), "ok\n\u{fffd}caf\u{fffd}");
    assert_eq!(echo, "ok\n\u{fffd}caf\u{fffd}\n");
}

#[test]
fn crlf_line_endings_are_trimmed() {
    let temp = TempDir::new().unwrap();
    let (result, _) = run(&sh("printf 'a\\r\\nb\\r\\n'"), &ExecContext::new(temp.path()));

    assert_eq!(result.unwrap(), "a\nb");
}

#[test]
fn non_zero_exit_is_execution_error() {
    let temp = TempDir::new().unwrap();
    let (result, _) = run(&sh("echo partial; exit 3"), &ExecContext::new(temp.path()));

    match result.unwrap_err() {
        DeployError::Execution { command, reason } => {
            assert!(command.starts_with("sh -c"));
            assert_eq!(reason, "exited with status 3");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_program_is_execution_error() {
    let temp = TempDir::new().unwrap();
    let (result, _) = run(
        &Invocation::new("cookout-no-such-program-xyz"),
        &ExecContext::new(temp.path()),
    );

    let err = result.unwrap_err();
    assert!(matches!(err, DeployError::Execution { .. }));
    assert!(err.to_string().contains("spawn failed"));
}

#[test]
fn runs_in_context_directory_without_moving_parent() {
    let temp = TempDir::new().unwrap();
    let before = std::env::current_dir().unwrap();

    let (result, _) = run(&Invocation::new("pwd").arg("-P"), &ExecContext::new(temp.path()));

    let reported = std::path::PathBuf::from(result.unwrap());
    assert_eq!(
        reported.canonicalize().unwrap(),
        temp.path().canonicalize().unwrap()
    );
    assert_eq!(std::env::current_dir().unwrap(), before);
}

#[test]
fn env_overlay_reaches_child_only() {
    let temp = TempDir::new().unwrap();
    let ctx = ExecContext::new(temp.path()).with_env("COOKOUT_RUNNER_TEST", "wrapped");

    let (result, _) = run(&sh("echo \"$COOKOUT_RUNNER_TEST\""), &ctx);

    assert_eq!(result.unwrap(), "wrapped");
    assert!(std::env::var("COOKOUT_RUNNER_TEST").is_err());
}

#[test]
fn large_stderr_does_not_block() {
    let temp = TempDir::new().unwrap();
    let (result, _) = run(
        &sh("i=0; while [ $i -lt 5000 ]; do echo err-line-$i 1>&2; i=$((i+1)); done; echo done"),
        &ExecContext::new(temp.path()),
    );

    assert_eq!(result.unwrap(), "done");
}
