//! Forks a job's process and execs its program in the child.

use std::ffi::CString;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;

use failure::Fail;
use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, ForkResult, Pid};

use crate::core::job::Job;
use crate::errors::{Error, ErrorKind, Result};
use crate::shell::terminal::{Terminal, JOB_CONTROL_SIGNALS};

/// Everything the child needs before exec, prepared in the parent so the
/// child only makes system calls between fork and exec.
#[derive(Debug)]
struct LaunchPlan {
    program: CString,
    argv: Vec<CString>,
    stdin: RawFd,
    stdout: RawFd,
    /// Set when the job starts in the foreground of a real terminal.
    terminal: Option<RawFd>,
    failure_message: Vec<u8>,
}

impl LaunchPlan {
    fn new(job: &Job, terminal: &dyn Terminal) -> Result<Self> {
        let program = CString::new(job.program_path().as_os_str().as_bytes())
            .map_err(|_| Error::syntax(job.input()))?;
        let argv = job
            .argv()
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::syntax(job.input()))?;
        let (stdin, stdout) = job.stdio_fds();
        let terminal = if job.is_background() {
            None
        } else {
            terminal.child_fd()
        };
        let failure_message = format!(
            "psh: {}: exec failed for argv {:?}: ",
            job.program_path().display(),
            job.argv()
        )
        .into_bytes();

        Ok(LaunchPlan {
            program,
            argv,
            stdin,
            stdout,
            terminal,
            failure_message,
        })
    }

    /// Runs in the forked child and never returns.
    fn exec(&self) -> ! {
        // Own process group, so the whole job can be addressed by one id.
        if let Err(e) = unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0)) {
            self.report(b"psh: setpgid failed: ", e);
        }

        // The parent makes the same call; whichever runs first wins and the
        // second is a no-op.
        if let Some(fd) = self.terminal {
            if let Err(e) = unistd::tcsetpgrp(fd, unistd::getpid()) {
                self.report(b"psh: tcsetpgrp failed: ", e);
            }
        }

        // Restore the dispositions the shell ignores, and SIGCHLD.
        for &sig in JOB_CONTROL_SIGNALS.iter().chain([Signal::SIGCHLD].iter()) {
            let _ = unsafe { signal::signal(sig, SigHandler::SigDfl) };
        }

        if self.stdin != libc::STDIN_FILENO {
            if let Err(e) = unistd::dup2(self.stdin, libc::STDIN_FILENO) {
                self.fail(b"psh: failed to redirect stdin: ", e);
            }
        }
        if self.stdout != libc::STDOUT_FILENO {
            if let Err(e) = unistd::dup2(self.stdout, libc::STDOUT_FILENO) {
                self.fail(b"psh: failed to redirect stdout: ", e);
            }
        }

        let e = match unistd::execv(&self.program, &self.argv) {
            Err(e) => e,
            Ok(never) => match never {},
        };
        self.fail(&self.failure_message, e)
    }

    fn report(&self, message: &[u8], errno: Errno) {
        let _ = unistd::write(libc::STDERR_FILENO, message);
        let _ = unistd::write(libc::STDERR_FILENO, errno.desc().as_bytes());
        let _ = unistd::write(libc::STDERR_FILENO, b"\n");
    }

    fn fail(&self, message: &[u8], errno: Errno) -> ! {
        self.report(message, errno);
        unsafe { libc::_exit(127) }
    }
}

/// Forks the process for `job` and records its pid.
///
/// The parent puts the child in its own process group as well, closing the
/// race with the child's own `setpgid`. The shell's copies of any redirected
/// files are closed once the child has its own.
pub fn launch_job(job: &mut Job, terminal: &dyn Terminal) -> Result<Pid> {
    let plan = match LaunchPlan::new(job, terminal) {
        Ok(plan) => plan,
        Err(e) => {
            job.close_redirects();
            return Err(e);
        }
    };
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();

    let fork_result = unsafe { unistd::fork() };
    match fork_result {
        Ok(ForkResult::Child) => plan.exec(),
        Ok(ForkResult::Parent { child }) => {
            debug!("launched [{}] as pid {}", job.id(), child);
            job.set_process_id(child);
            job.close_redirects();
            let temp_result = set_process_group(child);
            log_if_err!(temp_result, "failed to set pgid for pid {}", child);
            Ok(child)
        }
        Err(e) => {
            job.close_redirects();
            Err(e.context(ErrorKind::Fork).into())
        }
    }
}

fn set_process_group(pid: Pid) -> Result<()> {
    loop {
        match unistd::setpgid(pid, pid) {
            Ok(()) => return Ok(()),
            Err(Errno::EINTR) => continue,
            // The child already exec'd (after its own setpgid) or is gone.
            Err(Errno::EACCES) | Err(Errno::ESRCH) => return Ok(()),
            Err(e) => return Err(e.context(ErrorKind::Nix).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs::{self, File};
    use std::path::PathBuf;

    use nix::unistd::getpgid;
    use tempdir::TempDir;

    use crate::core::job::{JobId, Redirect};
    use crate::core::parser::Command;
    use crate::shell::reaper::{self, WaitOutcome};
    use crate::shell::terminal::NoTerminal;
    use crate::util::PshExitStatusExt;

    fn job_for(words: &[&str], program: &str) -> Job {
        let words: Vec<String> = words.iter().map(|w| w.to_string()).collect();
        let command = Command::new(&words.join(" "), words).unwrap();
        Job::new(JobId(1), command, PathBuf::from(program))
    }

    #[test]
    fn test_child_leads_its_own_process_group() {
        let mut job = job_for(&["sleep", "1"], "/bin/sleep");
        let pid = launch_job(&mut job, &NoTerminal::new()).unwrap();

        assert_eq!(job.process_id(), Some(pid));
        assert_eq!(getpgid(Some(pid)).unwrap(), pid);
        assert_ne!(pid, unistd::getpgrp());

        let outcome = reaper::wait_for_process(pid).unwrap();
        assert_eq!(outcome, WaitOutcome::Exited(std::process::ExitStatus::from_success()));
    }

    #[test]
    fn test_exec_failure_only_ends_the_child() {
        let mut job = job_for(&["nope"], "/nonexistent/psh/nope");
        let pid = launch_job(&mut job, &NoTerminal::new()).unwrap();

        let outcome = reaper::wait_for_process(pid).unwrap();
        assert_eq!(outcome.exit_status().code(), Some(127));
    }

    #[test]
    fn test_redirections_are_installed() {
        let dir = TempDir::new("psh_launcher").unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        fs::write(&input, "redirected input\n").unwrap();

        let mut job = job_for(&["cat"], "/bin/cat");
        job.stdin = Redirect::File(File::open(&input).unwrap());
        job.stdout = Redirect::File(File::create(&output).unwrap());
        let pid = launch_job(&mut job, &NoTerminal::new()).unwrap();
        reaper::wait_for_process(pid).unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "redirected input\n");
        match (&job.stdin, &job.stdout) {
            (Redirect::Inherit, Redirect::Inherit) => {}
            other => panic!("shell kept redirect files open: {:?}", other),
        }
    }

    #[test]
    fn test_unlaunchable_job_releases_redirects() {
        let dir = TempDir::new("psh_launcher").unwrap();
        let output = dir.path().join("out.txt");

        let mut job = job_for(&["echo", "nul\0byte"], "/bin/echo");
        job.stdout = Redirect::File(File::create(&output).unwrap());
        assert!(launch_job(&mut job, &NoTerminal::new()).is_err());

        assert_eq!(job.process_id(), None);
        match job.stdout {
            Redirect::Inherit => {}
            ref other => panic!("shell kept redirect file open: {:?}", other),
        }
    }
}
