//! Progress checks against real shell commands.

use cas_functest::config::ProgressConfig;
use cas_functest::executor::LocalExecutor;
use cas_functest::progress::{ProgressError, ProgressExpectation, ProgressMonitor};

fn monitor() -> ProgressMonitor {
    ProgressMonitor::new(ProgressConfig {
        appear_timeout_secs: 5,
        poll_interval_ms: 20,
        read_size: 1024,
    })
}

#[test]
fn increasing_progress_passes() {
    let mut executor = LocalExecutor::new().unwrap();
    let report = monitor()
        .check(
            &mut executor,
            "printf '10.0%% '; sleep 0.1; printf '50.0%% '; sleep 0.1; printf '100.0%%\\n'",
            ProgressExpectation::Expected,
        )
        .unwrap();

    assert_eq!(report.history, vec![10.0, 50.0, 100.0]);
    assert_eq!(report.last, Some(100.0));
}

#[test]
fn progress_split_across_reads_is_parsed() {
    let mut executor = LocalExecutor::new().unwrap();
    let report = monitor()
        .check(
            &mut executor,
            "printf '\\r[==   ] 4'; sleep 0.1; printf '2.5%%\\r[=====] 100%%\\n'",
            ProgressExpectation::Expected,
        )
        .unwrap();

    assert_eq!(report.history, vec![42.5, 100.0]);
}

#[test]
fn decreasing_progress_fails() {
    let mut executor = LocalExecutor::new().unwrap();
    let err = monitor()
        .check(
            &mut executor,
            "printf '50.0%% '; sleep 0.1; printf '10.0%%'",
            ProgressExpectation::Expected,
        )
        .unwrap_err();

    match err {
        ProgressError::Decreased { from, to, .. } => {
            assert!((from - 50.0).abs() < f64::EPSILON);
            assert!((to - 10.0).abs() < f64::EPSILON);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn out_of_range_progress_fails() {
    let mut executor = LocalExecutor::new().unwrap();
    let err = monitor()
        .check(&mut executor, "printf '150%%'", ProgressExpectation::Expected)
        .unwrap_err();

    assert!(matches!(err, ProgressError::OutOfRange { .. }));
}

#[test]
fn missing_progress_reports_stderr() {
    let mut executor = LocalExecutor::new().unwrap();
    let err = monitor()
        .check(
            &mut executor,
            "echo starting; echo 'error: cache 3 does not exist' >&2; exit 1",
            ProgressExpectation::Expected,
        )
        .unwrap_err();

    match &err {
        ProgressError::NoProgress { stderr } => {
            assert_eq!(stderr, "error: cache 3 does not exist\n");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("cache 3 does not exist"));
}

#[test]
fn redirected_output_prints_no_progress() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out.log");
    let command = format!("printf '50%% 100%%' > {}", target.display());

    let mut executor = LocalExecutor::new().unwrap();
    let report = monitor()
        .check(&mut executor, command, ProgressExpectation::Absent)
        .unwrap();

    assert!(report.history.is_empty());
    assert_eq!(std::fs::read_to_string(target).unwrap(), "50% 100%");
}

#[test]
fn unexpected_progress_fails() {
    let mut executor = LocalExecutor::new().unwrap();
    let err = monitor()
        .check(&mut executor, "printf '25%%'", ProgressExpectation::Absent)
        .unwrap_err();

    assert!(matches!(err, ProgressError::UnexpectedProgress { .. }));
}

#[test]
fn pty_progress_passes() {
    let mut executor = LocalExecutor::new().unwrap();
    let (mut stdout, mut stderr) = executor
        .exec_command_pty("for p in 0 25 50 75 100; do printf '\\r%d%%' $p; sleep 0.05; done; echo")
        .unwrap();

    let report = monitor()
        .watch("pty loop", &mut stdout, &mut stderr, ProgressExpectation::Expected)
        .unwrap();
    assert_eq!(report.history, vec![0.0, 25.0, 50.0, 75.0, 100.0]);
}

#[test]
fn dashed_progress_bar_passes() {
    let mut executor = LocalExecutor::new().unwrap();
    let report = monitor()
        .check(
            &mut executor,
            "printf '[##--------20.0%%]'; sleep 0.1; \
             printf '\\r[#####-----50.0%%]'; sleep 0.1; \
             printf '\\r[##########100.0%%]\\n'",
            ProgressExpectation::Expected,
        )
        .unwrap();

    assert_eq!(report.history, vec![20.0, 50.0, 100.0]);
}
