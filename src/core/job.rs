use std::fmt;
use std::fs::File;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::PathBuf;
use std::process::ExitStatus;

use nix::libc;
use nix::unistd::Pid;

use crate::core::parser::Command;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct JobId(pub u32);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum JobStatus {
    Running,
    Stopped,
    Completed(ExitStatus),
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Stopped => write!(f, "Stopped"),
            JobStatus::Completed(status) => match status.code() {
                Some(0) | None => write!(f, "Done"),
                Some(code) => write!(f, "Exit {}", code),
            },
        }
    }
}

/// Where a job's stdin or stdout comes from.
#[derive(Debug)]
pub enum Redirect {
    Inherit,
    File(File),
}

impl Redirect {
    /// The descriptor the child should see on `target`.
    pub fn fd_or(&self, target: RawFd) -> RawFd {
        match self {
            Redirect::Inherit => target,
            Redirect::File(file) => file.as_raw_fd(),
        }
    }
}

impl Default for Redirect {
    fn default() -> Self {
        Redirect::Inherit
    }
}

/// One launched external command. The job's single process is also the
/// leader of the job's process group, so `pgid == pid` once launched.
#[derive(Debug)]
pub struct Job {
    id: JobId,
    input: String,
    program_path: PathBuf,
    argv: Vec<String>,
    process_id: Option<Pid>,
    background: bool,
    status: JobStatus,
    notified: bool,
    pub stdin: Redirect,
    pub stdout: Redirect,
}

impl Job {
    pub fn new(id: JobId, command: Command, program_path: PathBuf) -> Self {
        Self {
            id,
            input: command.input,
            program_path,
            argv: command.argv,
            process_id: None,
            background: command.background,
            status: JobStatus::Running,
            notified: false,
            stdin: Redirect::Inherit,
            stdout: Redirect::Inherit,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn program_path(&self) -> &PathBuf {
        &self.program_path
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    pub fn process_id(&self) -> Option<Pid> {
        self.process_id
    }

    pub fn set_process_id(&mut self, pid: Pid) {
        debug_assert!(self.process_id.is_none(), "job already launched");
        self.process_id = Some(pid);
    }

    pub fn is_background(&self) -> bool {
        self.background
    }

    pub fn set_background(&mut self, background: bool) {
        self.background = background;
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        match self.status {
            JobStatus::Completed(_) => true,
            _ => false,
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.status == JobStatus::Stopped
    }

    /// Completion is final; later calls leave the first status in place.
    pub fn mark_completed(&mut self, exit_status: ExitStatus) {
        if !self.is_completed() {
            self.status = JobStatus::Completed(exit_status);
            self.notified = false;
        }
    }

    pub fn mark_stopped(&mut self) {
        if !self.is_completed() {
            self.status = JobStatus::Stopped;
            self.notified = false;
        }
    }

    pub fn mark_running(&mut self) {
        if !self.is_completed() {
            self.status = JobStatus::Running;
        }
    }

    pub fn notified(&self) -> bool {
        self.notified
    }

    pub fn set_notified(&mut self, notified: bool) {
        self.notified = notified;
    }

    /// Raw descriptors the child installs on stdin and stdout.
    pub fn stdio_fds(&self) -> (RawFd, RawFd) {
        (
            self.stdin.fd_or(libc::STDIN_FILENO),
            self.stdout.fd_or(libc::STDOUT_FILENO),
        )
    }

    /// Closes the shell's copies of any redirected files.
    pub fn close_redirects(&mut self) {
        self.stdin = Redirect::Inherit;
        self.stdout = Redirect::Inherit;
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.process_id {
            Some(pid) => write!(f, "[{}] {} {}\t{}", self.id, pid, self.status, self.input),
            None => write!(f, "[{}] {}\t{}", self.id, self.status, self.input),
        }
    }
}
