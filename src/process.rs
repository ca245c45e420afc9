//! Tracking of spawned processes and redirected descriptors.
//!
//! A [`ProcessHandle`] is shared between the executor that spawned a process
//! and the channels reading its output. The executor keeps every handle and
//! every pseudo-terminal descriptor in a [`ProcessRegistry`] and tears them
//! down in a fixed order: signal all process groups, reap each process while
//! discarding its unread output, then close the descriptors.

use std::fmt;
use std::fs::File;
use std::os::fd::IntoRawFd;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::Child;
use tokio::runtime::Runtime;

use crate::channel::BoxedReader;

/// Descriptor shared between an executor and the channel reading from it.
///
/// The executor empties the slot (closing the descriptor) during teardown;
/// channels never close it themselves.
pub type FdSlot = Arc<Mutex<Option<File>>>;

/// Wrap an open file in a new shared slot.
#[must_use]
pub fn fd_slot(file: File) -> FdSlot {
    Arc::new(Mutex::new(Some(file)))
}

/// Output pipe shared between a channel and the registry.
///
/// The registry takes the reader out during teardown; a channel finding the
/// slot empty treats it as end of data.
pub type StreamSlot = Arc<Mutex<Option<BoxedReader>>>;

/// One piped output stream of a child, claimable by a single channel.
struct OutputPipe {
    slot: StreamSlot,
    claimed: AtomicBool,
}

impl OutputPipe {
    fn new(reader: Option<BoxedReader>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(reader)),
            claimed: AtomicBool::new(false),
        }
    }

    fn claim(&self) -> Option<StreamSlot> {
        if self.claimed.swap(true, Ordering::SeqCst) {
            return None;
        }
        let present = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        present.then(|| Arc::clone(&self.slot))
    }

    fn take(&self) -> Option<BoxedReader> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

impl fmt::Debug for OutputPipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputPipe")
            .field("claimed", &self.claimed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Shared handle to a spawned child process.
///
/// Methods taking the child lock block the calling thread and must not be
/// called from inside an async context.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    inner: Arc<ProcessInner>,
}

#[derive(Debug)]
struct ProcessInner {
    command: String,
    pid: Option<u32>,
    child: tokio::sync::Mutex<Child>,
    stdout: OutputPipe,
    stderr: OutputPipe,
}

impl ProcessHandle {
    /// Track a child spawned in its own process group.
    #[must_use]
    pub fn new(command: impl Into<String>, mut child: Child) -> Self {
        let pid = child.id();
        let stdout = child.stdout.take().map(|s| Box::new(s) as BoxedReader);
        let stderr = child.stderr.take().map(|s| Box::new(s) as BoxedReader);
        Self {
            inner: Arc::new(ProcessInner {
                command: command.into(),
                pid,
                child: tokio::sync::Mutex::new(child),
                stdout: OutputPipe::new(stdout),
                stderr: OutputPipe::new(stderr),
            }),
        }
    }

    /// The command line the process was started with.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.inner.command
    }

    /// Process ID recorded at spawn time.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.inner.pid
    }

    /// Exit status, if the process has already exited.
    ///
    /// Once a status has been observed it is returned on every later call.
    /// A process whose state cannot be queried is reported as exited with no
    /// code so that readers waiting on it stop.
    #[must_use]
    pub fn try_status(&self) -> Option<Option<ExitStatus>> {
        let mut child = self.inner.child.blocking_lock();
        match child.try_wait() {
            Ok(Some(status)) => Some(Some(status)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(
                    command = %self.inner.command,
                    error = %e,
                    "Failed to query process state, treating it as exited"
                );
                Some(None)
            }
        }
    }

    /// Check if the process has exited without blocking.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.try_status().is_some()
    }

    /// Exit code, if the process exited normally.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.try_status().flatten().and_then(|status| status.code())
    }

    /// Claim the stdout pipe for a channel. Only the first call succeeds,
    /// and only if stdout was piped.
    #[must_use]
    pub fn claim_stdout(&self) -> Option<StreamSlot> {
        self.inner.stdout.claim()
    }

    /// Claim the stderr pipe for a channel. Only the first call succeeds.
    #[must_use]
    pub fn claim_stderr(&self) -> Option<StreamSlot> {
        self.inner.stderr.claim()
    }

    /// Send a signal to the process group led by this process.
    ///
    /// Commands run through a shell, so signalling the group also reaches
    /// the programs the shell started.
    pub fn signal(&self, signal: Signal) {
        let Some(pid) = self.inner.pid else {
            return;
        };
        let pgid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        match killpg(pgid, signal) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => tracing::warn!(
                command = %self.inner.command,
                pid,
                signal = ?signal,
                error = %e,
                "Failed to signal process group"
            ),
        }
    }

    /// Wait for the process to exit, killing it if it outlives `grace`.
    ///
    /// Output no channel has read yet is drained and discarded meanwhile, so
    /// a process blocked on a full pipe can still finish. Channels over this
    /// process see end of data afterwards.
    pub fn wait_or_kill(&self, runtime: &Runtime, grace: Duration) {
        let stdout = self.inner.stdout.take();
        let stderr = self.inner.stderr.take();

        runtime.block_on(async {
            let mut child = self.inner.child.lock().await;
            let finished = tokio::time::timeout(grace, async {
                tokio::join!(child.wait(), discard(stdout), discard(stderr))
            })
            .await;

            match finished {
                Ok((Ok(status), out, err)) => {
                    tracing::debug!(
                        command = %self.inner.command,
                        %status,
                        discarded_stdout = out,
                        discarded_stderr = err,
                        "Process reaped"
                    );
                }
                Ok((Err(e), _, _)) => {
                    tracing::warn!(command = %self.inner.command, error = %e, "Failed to wait for process");
                }
                Err(_) => {
                    tracing::warn!(
                        command = %self.inner.command,
                        grace_ms = grace.as_millis(),
                        "Process did not exit after SIGTERM, killing"
                    );
                    self.signal(Signal::SIGKILL);
                    if let Err(e) = child.kill().await {
                        tracing::warn!(command = %self.inner.command, error = %e, "Failed to kill process");
                    }
                }
            }
        });
    }
}

/// Read `reader` to its end, returning how many bytes were thrown away.
async fn discard(reader: Option<BoxedReader>) -> u64 {
    let Some(mut reader) = reader else {
        return 0;
    };
    match tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
        Ok(count) => count,
        Err(e) => {
            tracing::debug!(error = %e, "Failed to drain process output");
            0
        }
    }
}

/// Processes and descriptors owned by one executor.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    processes: Vec<ProcessHandle>,
    descriptors: Vec<FdSlot>,
}

impl ProcessRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track_process(&mut self, process: ProcessHandle) {
        self.processes.push(process);
    }

    pub fn track_descriptor(&mut self, slot: FdSlot) {
        self.descriptors.push(slot);
    }

    #[must_use]
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    #[must_use]
    pub fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }

    /// Terminate every tracked process, reap them in spawn order, then close
    /// every tracked descriptor.
    ///
    /// Faults are logged and teardown continues.
    pub fn teardown(&mut self, runtime: &Runtime, grace: Duration) {
        tracing::debug!(
            processes = self.processes.len(),
            descriptors = self.descriptors.len(),
            "Tearing down process registry"
        );

        // The shell may be gone while programs it started in the background
        // still run in its group, so every group is signalled.
        for process in &self.processes {
            process.signal(Signal::SIGTERM);
        }

        for process in self.processes.drain(..) {
            process.wait_or_kill(runtime, grace);
        }

        for slot in self.descriptors.drain(..) {
            close_slot(&slot);
        }
    }
}

/// Close the descriptor held by `slot`, leaving it empty.
pub fn close_slot(slot: &FdSlot) {
    let file = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(file) = file {
        let fd = file.into_raw_fd();
        if let Err(e) = nix::unistd::close(fd) {
            tracing::warn!(fd, error = %e, "Failed to close descriptor");
        }
    }
}
