//! Collects state changes of the shell's children.
//!
//! There is no SIGCHLD handler: foreground jobs are waited for directly, and
//! everything else is polled after each command line and by `wait`.

use std::process::ExitStatus;
use std::thread;
use std::time::Duration;

use failure::Fail;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{self, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::errors::{ErrorKind, Result};
use crate::shell::job_table::JobTable;
use crate::util::PshExitStatusExt;

/// Upper bound on the number of polls `wait` performs before giving up on
/// jobs that never report.
pub const WAIT_POLL_LIMIT: u32 = 3000;
/// Pause between two polls of `wait`.
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WaitOutcome {
    /// The process exited or was killed by a signal.
    Exited(ExitStatus),
    Stopped(Signal),
    Continued,
}

impl WaitOutcome {
    fn from_wait_status(wait_status: WaitStatus) -> Option<(Pid, WaitOutcome)> {
        match wait_status {
            WaitStatus::Exited(pid, code) => {
                debug!("{} exited with {}.", pid, code);
                Some((pid, WaitOutcome::Exited(ExitStatus::from_status(code))))
            }
            WaitStatus::Signaled(pid, signal, _) => {
                debug!("{} terminated by signal {:?}.", pid, signal);
                let code = 128 + signal as i32;
                Some((pid, WaitOutcome::Exited(ExitStatus::from_status(code))))
            }
            WaitStatus::Stopped(pid, signal) => {
                debug!("{} was signaled to stop {:?}.", pid, signal);
                Some((pid, WaitOutcome::Stopped(signal)))
            }
            WaitStatus::Continued(pid) => {
                debug!("{} was continued.", pid);
                Some((pid, WaitOutcome::Continued))
            }
            _ => None,
        }
    }

    /// Exit status the shell reports for this outcome.
    pub fn exit_status(self) -> ExitStatus {
        match self {
            WaitOutcome::Exited(status) => status,
            WaitOutcome::Stopped(signal) => ExitStatus::from_status(128 + signal as i32),
            WaitOutcome::Continued => ExitStatus::from_success(),
        }
    }
}

/// Records `outcome` for `pid`. Returns `false` if no job owns `pid`.
pub fn apply_outcome(jobs: &mut JobTable, pid: Pid, outcome: WaitOutcome) -> bool {
    match outcome {
        WaitOutcome::Exited(status) => jobs.mark_completed(pid, status),
        WaitOutcome::Stopped(_) => jobs.mark_stopped(pid),
        WaitOutcome::Continued => jobs.mark_running(pid),
    }
}

/// Blocks until `pid` exits, is killed or stops.
pub fn wait_for_process(pid: Pid) -> Result<WaitOutcome> {
    loop {
        match wait::waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
            Ok(wait_status) => match WaitOutcome::from_wait_status(wait_status) {
                Some((_, WaitOutcome::Continued)) | None => continue,
                Some((_, outcome)) => return Ok(outcome),
            },
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(e.context(ErrorKind::Nix).into()),
        }
    }
}

/// Checks every unfinished job for status changes, without blocking.
pub fn update_job_statuses(jobs: &mut JobTable) -> Result<()> {
    let pids: Vec<Pid> = jobs.active_jobs().filter_map(|job| job.process_id()).collect();
    let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;

    for pid in pids {
        match wait::waitpid(pid, Some(flags)) {
            Ok(WaitStatus::StillAlive) | Err(Errno::EINTR) => {}
            Ok(wait_status) => {
                if let Some((pid, outcome)) = WaitOutcome::from_wait_status(wait_status) {
                    apply_outcome(jobs, pid, outcome);
                }
            }
            Err(Errno::ECHILD) => {
                // Already reaped elsewhere; it is never going to report.
                warn!("{} is no longer a child of the shell", pid);
                jobs.mark_completed(pid, ExitStatus::from_failure());
            }
            Err(e) => return Err(e.context(ErrorKind::Nix).into()),
        }
    }

    Ok(())
}

/// Polls until every job has completed, at most `limit` times.
///
/// Returns `false` if jobs were still unfinished after the last poll.
pub fn wait_for_all(jobs: &mut JobTable, limit: u32, interval: Duration) -> Result<bool> {
    for attempt in 0..limit {
        update_job_statuses(jobs)?;
        if jobs.all_completed() {
            debug!("all jobs completed after {} polls", attempt + 1);
            return Ok(true);
        }
        thread::sleep(interval);
    }

    warn!("gave up waiting for jobs after {} polls", limit);
    Ok(jobs.all_completed())
}
