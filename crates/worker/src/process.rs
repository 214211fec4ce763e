use std::io::{self, Write};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};
use tracing::{debug, warn};

use jobpool_core::{capture_panic, JobError, JobId, Strategy};

use crate::error::WorkerError;
use crate::handle::{Entrypoint, JobFactory, WorkerHandle};

/// Worker running in a forked child process.
///
/// The child shares nothing with the manager after the fork except the
/// inherited file descriptors, so results must come back through a
/// process-capable channel. Exit status is the child's exit code, or the
/// negated signal number if it was killed.
pub struct ProcessWorker {
    id: JobId,
    pid: Pid,
    status: Option<i32>,
    error: Option<JobError>,
}

impl ProcessWorker {
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Record a terminal wait status. Returns `false` while the child is
    /// still alive.
    fn settle(&mut self, status: WaitStatus) -> bool {
        match status {
            WaitStatus::Exited(_, code) => self.status = Some(code),
            WaitStatus::Signaled(_, signal, _) => self.status = Some(-(signal as i32)),
            _ => return false,
        }
        debug!(job_id = %self.id, pid = %self.pid, exit_status = ?self.status, "process worker reaped");
        true
    }

    fn wait_failed(&mut self, err: Errno) {
        warn!(job_id = %self.id, pid = %self.pid, "{}", WorkerError::Wait(err));
        self.status = Some(1);
        self.error = Some(JobError::runtime(format!("lost track of worker process: {err}")));
    }
}

impl WorkerHandle for ProcessWorker {
    fn id(&self) -> JobId {
        self.id
    }

    fn is_running(&mut self) -> bool {
        if self.status.is_some() {
            return false;
        }
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(status) => !self.settle(status),
            Err(Errno::EINTR) => true,
            Err(err) => {
                self.wait_failed(err);
                false
            }
        }
    }

    fn join(&mut self) {
        while self.status.is_none() {
            match waitpid(self.pid, None) {
                Ok(status) => {
                    self.settle(status);
                }
                Err(Errno::EINTR) => continue,
                Err(err) => self.wait_failed(err),
            }
        }
    }

    fn exit_status(&self) -> i32 {
        self.status.unwrap_or(0)
    }

    fn take_error(&mut self) -> Option<JobError> {
        self.error.take()
    }

    fn can_force_stop(&self) -> bool {
        true
    }

    /// Send `SIGTERM`. A child that already exited is left alone.
    fn force_stop(&mut self) -> Result<(), WorkerError> {
        if self.status.is_some() {
            return Ok(());
        }
        kill(self.pid, Signal::SIGTERM).map_err(WorkerError::Signal)
    }
}

/// Launches one [`ProcessWorker`] per job with `fork()`.
///
/// Only the launching thread survives in the child. A lock another thread
/// of the parent held at the fork stays held forever, so a job that prints
/// through `std::io`, allocates under a custom allocator lock or panics
/// while the carrier hook is installed can hang its worker when the parent
/// is multi-threaded. The worker's own failure report bypasses `std::io`.
///
/// Results travel back as single datagrams, so a value whose encoded form
/// exceeds the channel's frame limit (4 MiB) is delivered as a
/// `RuntimeError("result delivery failed: ...")` instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessFactory;

impl ProcessFactory {
    pub fn new() -> Self {
        Self
    }
}

impl JobFactory for ProcessFactory {
    fn strategy(&self) -> Strategy {
        Strategy::Process
    }

    fn launch(&self, id: JobId, entry: Entrypoint) -> Result<Box<dyn WorkerHandle>, WorkerError> {
        // Buffered output would otherwise be written twice.
        let _ = io::stdout().flush();

        match unsafe { unistd::fork() } {
            Ok(ForkResult::Child) => run_child(entry),
            Ok(ForkResult::Parent { child }) => {
                debug!(job_id = %id, pid = %child, "process worker launched");
                Ok(Box::new(ProcessWorker {
                    id,
                    pid: child,
                    status: None,
                    error: None,
                }))
            }
            Err(err) => Err(WorkerError::Fork(err)),
        }
    }
}

/// Child side of a launch. Never returns: the child must not unwind into
/// the manager's frames.
fn run_child(entry: Entrypoint) -> ! {
    let (outcome, trace) = capture_panic(entry);
    let code = match outcome {
        Ok(Ok(())) => 0,
        Ok(Err(error)) => {
            write_stderr(&error.report());
            1
        }
        Err(payload) => {
            if trace.is_some() {
                let error = JobError::from_panic(payload.as_ref()).attach_stacktrace(trace);
                write_stderr(&error.report());
            }
            1
        }
    };

    let _ = io::stdout().flush();
    unsafe { libc::_exit(code) }
}

/// Write straight to fd 2, without the `std::io::stderr` lock.
fn write_stderr(report: &str) {
    let bytes = format!("{report}\n").into_bytes();
    let mut rest: &[u8] = &bytes;
    while !rest.is_empty() {
        let n = unsafe { libc::write(libc::STDERR_FILENO, rest.as_ptr().cast(), rest.len()) };
        match n {
            n if n > 0 => rest = &rest[n as usize..],
            _ if Errno::last() == Errno::EINTR => continue,
            _ => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    use super::*;

    fn launch(entry: impl FnOnce() -> Result<(), JobError> + Send + 'static) -> Box<dyn WorkerHandle> {
        ProcessFactory::new().launch(JobId::new(), Box::new(entry)).unwrap()
    }

    #[test]
    fn clean_exit() {
        let mut worker = launch(|| Ok(()));
        worker.join();
        assert!(!worker.is_running());
        assert_eq!(worker.exit_status(), 0);
        assert!(worker.take_error().is_none());
    }

    #[test]
    fn returned_error_exits_with_one() {
        let mut worker = launch(|| Err(JobError::new("ValueError", "boom")));
        worker.join();
        assert_eq!(worker.exit_status(), 1);
        assert!(worker.take_error().is_none(), "the error stays in the child");
    }

    #[test]
    fn failure_report_ignores_stderr_lock_held_elsewhere() {
        let (locked_tx, locked_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = thread::spawn(move || {
            let _guard = io::stderr().lock();
            locked_tx.send(()).unwrap();
            let _ = release_rx.recv();
        });
        locked_rx.recv().unwrap();

        let mut worker = launch(|| Err(JobError::new("ValueError", "boom")));
        let deadline = Instant::now() + Duration::from_secs(10);
        while worker.is_running() {
            assert!(Instant::now() < deadline, "child blocked on the stderr lock");
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(worker.exit_status(), 1);

        release_tx.send(()).unwrap();
        holder.join().unwrap();
    }

    #[test]
    fn explicit_exit_code_is_reported() {
        let mut worker = launch(|| std::process::exit(9));
        worker.join();
        assert_eq!(worker.exit_status(), 9);
    }

    #[test]
    fn polling_eventually_reaps() {
        let mut worker = launch(|| {
            thread::sleep(Duration::from_millis(30));
            Ok(())
        });
        let deadline = Instant::now() + Duration::from_secs(10);
        while worker.is_running() {
            assert!(Instant::now() < deadline, "worker never finished");
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(worker.exit_status(), 0);
        worker.join();
        assert_eq!(worker.exit_status(), 0);
    }

    #[test]
    fn force_stop_reports_signal() {
        let mut worker = launch(|| {
            thread::sleep(Duration::from_secs(30));
            Ok(())
        });
        assert!(worker.can_force_stop());
        worker.force_stop().unwrap();
        worker.join();
        assert_eq!(worker.exit_status(), -(Signal::SIGTERM as i32));

        // Already reaped: nothing to signal.
        worker.force_stop().unwrap();
    }
}
