//! Local channels over piped process output.

use std::time::Duration;

use cas_functest::channel::Channel;
use cas_functest::executor::{Executor, LocalExecutor};
use cas_functest::wait::wait_until;

const EXIT_WAIT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(20);

#[test]
fn uneven_writes_read_in_fixed_chunks() {
    let mut executor = LocalExecutor::new().unwrap();
    let (mut stdout, _stderr) = executor
        .exec_command(
            "head -c 1000 /dev/zero; sleep 0.3; \
             head -c 700 /dev/zero; sleep 0.5; \
             head -c 800 /dev/zero",
        )
        .unwrap();

    assert!(wait_until(|| stdout.ready(), EXIT_WAIT, POLL));

    assert_eq!(stdout.read(1024).len(), 1024);
    assert!(!stdout.closed(), "process still has 1476 bytes to write");
    assert_eq!(stdout.read(1024).len(), 1024);
    assert_eq!(stdout.read(1024).len(), 452);
    assert!(stdout.read(1024).is_empty());

    assert!(wait_until(|| stdout.closed(), EXIT_WAIT, POLL));
}

#[test]
fn read_returns_exact_bytes_in_order() {
    let mut executor = LocalExecutor::new().unwrap();
    let (mut stdout, _stderr) = executor
        .exec_command("printf 'alpha '; sleep 0.1; printf 'beta '; sleep 0.1; printf gamma")
        .unwrap();

    assert!(wait_until(|| stdout.ready(), EXIT_WAIT, POLL));
    let mut collected = Vec::new();
    loop {
        let chunk = stdout.read(4);
        assert!(chunk.len() <= 4);
        if chunk.is_empty() {
            break;
        }
        collected.extend_from_slice(&chunk);
    }
    assert_eq!(collected, b"alpha beta gamma");
}

#[test]
fn process_without_output_is_ready_and_empty() {
    let mut executor = LocalExecutor::new().unwrap();
    let (mut stdout, mut stderr) = executor.exec_command("exit 0").unwrap();

    assert!(wait_until(|| stdout.ready(), EXIT_WAIT, POLL));
    assert!(stdout.read(1).is_empty());
    assert!(stdout.read(4096).is_empty());
    assert!(stderr.ready());
    assert!(stderr.read(16).is_empty());
    assert!(wait_until(|| stdout.closed(), EXIT_WAIT, POLL));
}

#[test]
fn zero_sized_read_consumes_nothing() {
    let mut executor = LocalExecutor::new().unwrap();
    let (mut stdout, _stderr) = executor.exec_command("printf abc").unwrap();

    assert!(stdout.read(0).is_empty());
    assert!(wait_until(|| stdout.ready(), EXIT_WAIT, POLL));
    assert!(stdout.read(0).is_empty());
    assert_eq!(stdout.read(3), b"abc");
}

#[test]
fn ready_is_sticky() {
    let mut executor = LocalExecutor::new().unwrap();
    let (mut stdout, _stderr) = executor.exec_command("printf x; sleep 0.2").unwrap();

    assert!(wait_until(|| stdout.ready(), EXIT_WAIT, POLL));
    assert_eq!(stdout.read(1), b"x");
    assert!(stdout.ready());
    assert!(stdout.read(8).is_empty());
    assert!(stdout.ready());
}

#[test]
fn closed_stays_true() {
    let mut executor = LocalExecutor::new().unwrap();
    let (stdout, _stderr) = executor.exec_command("exit 7").unwrap();

    assert!(wait_until(|| stdout.closed(), EXIT_WAIT, POLL));
    for _ in 0..5 {
        assert!(stdout.closed());
    }
}

#[test]
fn stderr_is_read_separately() {
    let mut executor = LocalExecutor::new().unwrap();
    let (mut stdout, mut stderr) = executor
        .exec_command("echo out; echo err >&2")
        .unwrap();

    assert!(wait_until(|| stderr.ready(), EXIT_WAIT, POLL));
    assert_eq!(stderr.read_to_end(64), b"err\n");
    assert!(wait_until(|| stdout.ready(), EXIT_WAIT, POLL));
    assert_eq!(stdout.read_to_end(64), b"out\n");
}
