//! Local channels over a pseudo-terminal.

use std::time::Duration;

use cas_functest::channel::Channel;
use cas_functest::executor::LocalExecutor;
use cas_functest::wait::wait_until;

const EXIT_WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(20);

#[test]
fn pty_output_uses_terminal_line_endings() {
    let mut executor = LocalExecutor::new().unwrap();
    let (mut stdout, _stderr) = executor.exec_command_pty("echo one; echo two").unwrap();

    assert!(wait_until(|| stdout.ready(), EXIT_WAIT, POLL));
    let output = stdout.read_to_end(64);
    assert_eq!(output, b"one\r\ntwo\r\n");
    assert!(wait_until(|| stdout.closed(), EXIT_WAIT, POLL));
}

#[test]
fn pty_command_sees_a_terminal() {
    let mut executor = LocalExecutor::new().unwrap();
    let (mut stdout, _stderr) = executor
        .exec_command_pty("if [ -t 1 ]; then echo tty; else echo pipe; fi")
        .unwrap();

    assert!(wait_until(|| stdout.ready(), EXIT_WAIT, POLL));
    assert_eq!(stdout.read_to_end(64), b"tty\r\n");
}

#[test]
fn shutdown_closes_pty_descriptor() {
    let mut executor = LocalExecutor::new().unwrap();
    let (stdout, _stderr) = executor.exec_command_pty("sleep 30").unwrap();
    assert_eq!(executor.tracked_descriptors(), 1);

    executor.shutdown();
    assert_eq!(executor.tracked_descriptors(), 0);
    assert!(wait_until(|| stdout.closed(), EXIT_WAIT, POLL));
}
