//! Job lifecycle: registration, launch, foreground and background.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::process::ExitStatus;

use failure::{Fail, ResultExt};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

use crate::core::job::{Job, JobId, Redirect};
use crate::core::parser::Command;
use crate::core::resolve;
use crate::errors::{Error, ErrorKind, Result};
use crate::shell::job_table::JobTable;
use crate::shell::launcher;
use crate::shell::reaper::{self, WaitOutcome};
use crate::shell::terminal::{ForegroundGuard, Terminal};
use crate::util::PshExitStatusExt;

/// Pid `fg` and `bg` look up when no job is named. No job ever has it.
pub const NO_JOB_PID: Pid = Pid::from_raw(-1);

/// Owns the job table and the terminal the jobs compete for.
pub struct JobManager {
    jobs: JobTable,
    terminal: Box<dyn Terminal>,
}

impl JobManager {
    pub fn new(terminal: Box<dyn Terminal>) -> Self {
        JobManager {
            jobs: JobTable::default(),
            terminal,
        }
    }

    /// Resolves the program, opens the redirections and registers the job.
    ///
    /// Nothing is registered if any of those steps fails.
    pub fn create_job(&mut self, command: Command) -> Result<JobId> {
        let program_path = resolve::find_executable(command.program())
            .ok_or_else(|| Error::command_not_found(command.program()))?;

        let stdin = match command.stdin {
            Some(ref path) => Redirect::File(open_input(path)?),
            None => Redirect::Inherit,
        };
        let stdout = match command.stdout {
            Some(ref path) => Redirect::File(open_output(path)?),
            None => Redirect::Inherit,
        };

        let mut job = Job::new(self.jobs.next_job_id(), command, program_path);
        job.stdin = stdin;
        job.stdout = stdout;
        Ok(self.jobs.register(job))
    }

    /// Forks the job's process. A job whose fork fails is marked completed
    /// with a failure status.
    pub fn launch_job(&mut self, job_id: JobId) -> Result<Pid> {
        let job = self
            .jobs
            .find_by_id_mut(job_id)
            .ok_or_else(|| Error::no_such_job(job_id))?;

        match launcher::launch_job(job, &*self.terminal) {
            Ok(pid) => Ok(pid),
            Err(e) => {
                job.mark_completed(ExitStatus::from_failure());
                Err(e)
            }
        }
    }

    /// Gives the terminal to the job with process `pid` and blocks until it
    /// exits, is killed or stops. Stopped jobs are sent SIGCONT first if
    /// `cont` is set.
    ///
    /// The terminal always goes back to the shell before this returns.
    pub fn put_job_in_foreground(&mut self, pid: Pid, cont: bool) -> Result<ExitStatus> {
        let job = self
            .jobs
            .find_by_pid(pid)
            .filter(|job| !job.is_completed())
            .ok_or_else(|| Error::no_such_job(pid))?;
        debug!("putting job [{}] in foreground", job.id());
        let stopped = job.is_stopped();

        let outcome = {
            let _guard = ForegroundGuard::new(&mut *self.terminal, pid);
            if cont && stopped {
                continue_process_group(pid)?;
                self.jobs.mark_running(pid);
            }
            reaper::wait_for_process(pid)
        };

        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                let fail: &dyn Fail = &e;
                if let Some(&Errno::ECHILD) = fail.find_root_cause().downcast_ref::<Errno>() {
                    // Reaped somewhere else; it will never report to us.
                    self.jobs.mark_completed(pid, ExitStatus::from_failure());
                }
                return Err(e);
            }
        };

        reaper::apply_outcome(&mut self.jobs, pid, outcome);
        if let WaitOutcome::Stopped(_) = outcome {
            if let Some(job) = self.jobs.find_by_pid_mut(pid) {
                job.set_background(true);
                job.set_notified(true);
                println!();
                println!("{}", job);
            }
        }

        Ok(outcome.exit_status())
    }

    /// Resumes the job with process `pid` without giving it the terminal.
    pub fn put_job_in_background(&mut self, pid: Pid, cont: bool) -> Result<()> {
        let job = self
            .jobs
            .find_by_pid_mut(pid)
            .filter(|job| !job.is_completed())
            .ok_or_else(|| Error::no_such_job(pid))?;
        debug!("putting job [{}] in background", job.id());
        job.set_background(true);

        if cont {
            continue_process_group(pid)?;
            self.jobs.mark_running(pid);
        }

        Ok(())
    }

    /// Checks for state changes of unfinished jobs without blocking.
    pub fn update_job_statuses(&mut self) -> Result<()> {
        reaper::update_job_statuses(&mut self.jobs)
    }

    /// Reports background jobs that finished and jobs that stopped, once
    /// each.
    pub fn do_job_notification(&mut self, out: &mut dyn Write) {
        let temp_result = self.update_job_statuses();
        log_if_err!(temp_result, "do_job_notification");

        for job in self.jobs.iter_mut() {
            if job.notified() {
                continue;
            }

            let report = if job.is_completed() {
                job.is_background()
            } else {
                job.is_stopped()
            };
            if report {
                let temp_result = writeln!(out, "{}", job);
                log_if_err!(temp_result, "failed to report job [{}]", job.id());
            }
            if job.is_completed() || job.is_stopped() {
                job.set_notified(true);
            }
        }
    }

    /// Polls until every job has completed or the poll limit is reached.
    pub fn wait_for_all_jobs(&mut self) -> Result<bool> {
        reaper::wait_for_all(
            &mut self.jobs,
            reaper::WAIT_POLL_LIMIT,
            reaper::WAIT_POLL_INTERVAL,
        )
    }

    /// Jobs that have not completed, oldest first.
    pub fn get_jobs(&self) -> Vec<&Job> {
        self.jobs.active_jobs().collect()
    }

    pub fn is_background(&self, job_id: JobId) -> bool {
        self.jobs
            .find_by_id(job_id)
            .map_or(false, Job::is_background)
    }
}

impl fmt::Debug for JobManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "terminal: {:?}", self.terminal)?;
        write!(f, "{:?}", self.jobs)
    }
}

fn continue_process_group(pgid: Pid) -> Result<()> {
    signal::killpg(pgid, Signal::SIGCONT).context(ErrorKind::Nix)?;
    Ok(())
}

fn open_input(path: &str) -> Result<File> {
    let file = File::open(path).context(ErrorKind::Redirect(path.to_string()))?;
    Ok(file)
}

fn open_output(path: &str) -> Result<File> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .context(ErrorKind::Redirect(path.to_string()))?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use tempdir::TempDir;

    use crate::core::parser;
    use crate::shell::terminal::tests::{Event, FakeTerminal};

    fn command(line: &str) -> Command {
        Command::new(line, parser::split_line(line).unwrap()).unwrap()
    }

    fn manager() -> (JobManager, FakeTerminal) {
        let terminal = FakeTerminal::new();
        (JobManager::new(Box::new(terminal.clone())), terminal)
    }

    fn is_stopped(manager: &JobManager, pid: Pid) -> bool {
        manager.jobs.find_by_pid(pid).map_or(false, Job::is_stopped)
    }

    /// Polls until the job with `pid` reports a stop.
    fn wait_until_stopped(manager: &mut JobManager, pid: Pid) {
        for _ in 0..250 {
            manager.update_job_statuses().unwrap();
            if is_stopped(manager, pid) {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(20));
        }
        panic!("job {} never stopped", pid);
    }

    #[test]
    fn test_foreground_wait_returns_terminal() {
        let (mut manager, terminal) = manager();
        let job_id = manager.create_job(command("/bin/true")).unwrap();
        let pid = manager.launch_job(job_id).unwrap();

        let status = manager.put_job_in_foreground(pid, false).unwrap();
        assert!(status.success());
        assert_eq!(
            terminal.events(),
            vec![Event::Claim(pid), Event::ReturnToShell]
        );
        assert_eq!(terminal.owner(), terminal.shell_pgid);
        assert!(manager.get_jobs().is_empty());
    }

    #[test]
    fn test_terminal_returned_when_wait_fails() {
        let (mut manager, terminal) = manager();
        let job_id = manager.create_job(command("/bin/true")).unwrap();
        let pid = manager.launch_job(job_id).unwrap();
        // Reap it behind the manager's back so its own wait fails.
        reaper::wait_for_process(pid).unwrap();

        assert!(manager.put_job_in_foreground(pid, false).is_err());
        assert_eq!(terminal.owner(), terminal.shell_pgid);
        assert_eq!(terminal.events().last(), Some(&Event::ReturnToShell));
        assert!(manager.get_jobs().is_empty());
    }

    #[test]
    fn test_fg_unknown_pid_is_no_such_job() {
        let (mut manager, terminal) = manager();
        for &pid in &[Pid::from_raw(999_999), NO_JOB_PID] {
            let err = manager.put_job_in_foreground(pid, true).unwrap_err();
            assert_eq!(*err.kind(), ErrorKind::NoSuchJob(pid.to_string()));
            let err = manager.put_job_in_background(pid, true).unwrap_err();
            assert_eq!(*err.kind(), ErrorKind::NoSuchJob(pid.to_string()));
        }
        assert!(terminal.events().is_empty());
    }

    #[test]
    fn test_exit_status_of_foreground_job() {
        let (mut manager, _terminal) = manager();
        let job_id = manager.create_job(command("/bin/false")).unwrap();
        let pid = manager.launch_job(job_id).unwrap();
        assert_eq!(manager.put_job_in_foreground(pid, false).unwrap().code(), Some(1));
    }

    #[test]
    fn test_background_jobs_complete_after_wait() {
        let (mut manager, terminal) = manager();
        let job_id = manager.create_job(command("/bin/sleep 0.2 &")).unwrap();
        assert!(manager.is_background(job_id));
        manager.launch_job(job_id).unwrap();

        assert_eq!(manager.get_jobs().len(), 1);
        assert!(manager.wait_for_all_jobs().unwrap());
        assert!(manager.get_jobs().is_empty());
        assert!(terminal.events().is_empty());

        let mut out = Vec::new();
        manager.do_job_notification(&mut out);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Done\t/bin/sleep 0.2 &"), "{:?}", out);

        // reported only once
        let mut out = Vec::new();
        manager.do_job_notification(&mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_live_jobs_have_distinct_pids() {
        let (mut manager, _terminal) = manager();
        let pids: Vec<Pid> = (0..3)
            .map(|_| {
                let job_id = manager.create_job(command("/bin/sleep 5 &")).unwrap();
                manager.launch_job(job_id).unwrap()
            })
            .collect();

        assert_ne!(pids[0], pids[1]);
        assert_ne!(pids[1], pids[2]);
        assert_ne!(pids[0], pids[2]);
        let listed: Vec<Option<Pid>> = manager.get_jobs().iter().map(|job| job.process_id()).collect();
        assert_eq!(listed, pids.iter().cloned().map(Some).collect::<Vec<_>>());

        for &pid in &pids {
            signal::kill(pid, Signal::SIGKILL).unwrap();
        }
        assert!(manager.wait_for_all_jobs().unwrap());
    }

    #[test]
    fn test_command_not_found_is_not_registered() {
        let (mut manager, _terminal) = manager();
        let err = manager
            .create_job(command("psh-no-such-program-anywhere"))
            .unwrap_err();
        assert_eq!(
            *err.kind(),
            ErrorKind::CommandNotFound("psh-no-such-program-anywhere".to_string())
        );
        assert!(manager.wait_for_all_jobs().unwrap());
    }

    #[test]
    fn test_missing_input_file_is_a_redirect_error() {
        let dir = TempDir::new("psh_job_control").unwrap();
        let missing = dir.path().join("missing.txt");
        let line = format!("/bin/cat < {}", missing.display());

        let (mut manager, _terminal) = manager();
        let err = manager.create_job(command(&line)).unwrap_err();
        assert_eq!(
            *err.kind(),
            ErrorKind::Redirect(missing.display().to_string())
        );
    }

    #[test]
    fn test_output_redirect_truncates() {
        let dir = TempDir::new("psh_job_control").unwrap();
        let output = dir.path().join("out.txt");
        fs::write(&output, "stale contents that are longer\n").unwrap();
        let line = format!("/bin/echo fresh > {}", output.display());

        let (mut manager, _terminal) = manager();
        let job_id = manager.create_job(command(&line)).unwrap();
        let pid = manager.launch_job(job_id).unwrap();
        manager.put_job_in_foreground(pid, false).unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "fresh\n");
    }

    #[test]
    fn test_stopped_job_resumes_in_background_then_foreground() {
        let (mut manager, terminal) = manager();
        let job_id = manager.create_job(command("/bin/sleep 1 &")).unwrap();
        let pid = manager.launch_job(job_id).unwrap();

        signal::kill(pid, Signal::SIGSTOP).unwrap();
        wait_until_stopped(&mut manager, pid);
        let mut out = Vec::new();
        manager.do_job_notification(&mut out);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Stopped\t/bin/sleep 1 &"), "{:?}", out);

        manager.put_job_in_background(pid, true).unwrap();
        assert!(!is_stopped(&manager, pid));
        assert!(manager.is_background(job_id));
        assert!(terminal.events().is_empty());

        signal::kill(pid, Signal::SIGSTOP).unwrap();
        wait_until_stopped(&mut manager, pid);

        let status = manager.put_job_in_foreground(pid, true).unwrap();
        assert!(status.success());
        assert_eq!(
            terminal.events(),
            vec![Event::Claim(pid), Event::ReturnToShell]
        );
        assert_eq!(terminal.owner(), terminal.shell_pgid);
        assert!(manager.get_jobs().is_empty());
    }

    #[test]
    fn test_foreground_job_that_stops_moves_to_background() {
        let (mut manager, terminal) = manager();
        let job_id = manager.create_job(command("/bin/sleep 1")).unwrap();
        let pid = manager.launch_job(job_id).unwrap();
        assert!(!manager.is_background(job_id));

        signal::kill(pid, Signal::SIGSTOP).unwrap();
        let status = manager.put_job_in_foreground(pid, false).unwrap();
        assert_eq!(status.code(), Some(128 + Signal::SIGSTOP as i32));
        assert!(is_stopped(&manager, pid));
        assert!(manager.is_background(job_id));
        assert_eq!(terminal.owner(), terminal.shell_pgid);

        // the stop was already announced
        let mut out = Vec::new();
        manager.do_job_notification(&mut out);
        assert!(out.is_empty());
        assert_eq!(manager.get_jobs().len(), 1);

        manager.put_job_in_foreground(pid, true).unwrap();
        assert_eq!(
            terminal.events(),
            vec![
                Event::Claim(pid),
                Event::ReturnToShell,
                Event::Claim(pid),
                Event::ReturnToShell,
            ]
        );
        assert!(manager.get_jobs().is_empty());
    }
}
