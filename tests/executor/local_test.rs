//! Local executor lifecycle against real processes.

use std::time::{Duration, Instant};

use cas_functest::channel::Channel;
use cas_functest::executor::{CommandLine, Executor, ExecutorError, LocalExecutor};
use cas_functest::wait::wait_until;

fn first_line<E: Executor>(executor: &mut E, command: impl Into<CommandLine>) -> String {
    let output = executor.run(command, Duration::from_secs(10)).unwrap();
    output.stdout_str().lines().next().unwrap_or_default().to_string()
}

#[test]
fn argv_commands_are_quoted() {
    let mut executor = LocalExecutor::new().unwrap();
    let line = first_line(&mut executor, ["printf", "%s|", "a b", "$HOME"]);
    assert_eq!(line, "a b|$HOME|");
}

#[test]
fn local_executor_is_not_remote_and_cannot_reboot() {
    let mut executor = LocalExecutor::new().unwrap();
    assert!(!executor.is_remote());
    assert!(matches!(
        executor.reboot(),
        Err(ExecutorError::Unsupported(_))
    ));
}

#[test]
fn shutdown_terminates_running_commands() {
    let mut executor = LocalExecutor::new().unwrap();
    let (first, _first_err) = executor.exec_command("sleep 30").unwrap();
    let (second, _second_err) = executor.exec_command("sleep 30").unwrap();
    assert_eq!(executor.tracked_processes(), 2);

    let started = Instant::now();
    executor.shutdown();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(executor.tracked_processes(), 0);
    assert!(first.closed());
    assert!(second.closed());
}

#[test]
fn shutdown_escalates_when_term_is_ignored() {
    let mut executor = LocalExecutor::new().unwrap();
    let (mut stdout, _stderr) = executor
        .exec_command("trap '' TERM; echo armed; while true; do sleep 0.1; done")
        .unwrap();
    assert!(wait_until(
        || stdout.ready(),
        Duration::from_secs(5),
        Duration::from_millis(20)
    ));

    executor.shutdown();
    assert!(stdout.closed());
}

#[test]
fn executor_rejects_commands_after_shutdown() {
    let mut executor = LocalExecutor::new().unwrap();
    executor.shutdown();
    executor.shutdown();

    assert!(matches!(
        executor.exec_command("true"),
        Err(ExecutorError::ShutDown)
    ));
    assert!(matches!(
        executor.run("true", Duration::from_secs(1)),
        Err(ExecutorError::ShutDown)
    ));
}

#[test]
fn shutdown_reaches_background_children_of_exited_shell() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker");
    let command = format!(
        "(sleep 1; touch '{}') >/dev/null 2>&1 & echo started",
        marker.display()
    );

    let mut executor = LocalExecutor::new().unwrap();
    let (mut stdout, _stderr) = executor.exec_command(command).unwrap();
    assert!(wait_until(
        || stdout.ready(),
        Duration::from_secs(5),
        Duration::from_millis(20)
    ));
    assert_eq!(stdout.read_to_end(64), b"started\n");
    assert!(wait_until(
        || stdout.closed(),
        Duration::from_secs(5),
        Duration::from_millis(20)
    ));

    executor.shutdown();
    std::thread::sleep(Duration::from_secs(2));

    assert!(!marker.exists(), "background child outlived shutdown");
}

#[test]
fn shutdown_discards_unread_output() {
    let mut executor = LocalExecutor::new().unwrap();
    let (mut stdout, _stderr) = executor
        .exec_command("trap '' TERM; head -c 300000 /dev/zero; echo done >&2")
        .unwrap();
    assert!(wait_until(
        || stdout.ready(),
        Duration::from_secs(5),
        Duration::from_millis(20)
    ));

    let started = Instant::now();
    executor.shutdown();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(stdout.closed());
}
