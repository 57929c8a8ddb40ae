//! Ownership of the controlling terminal.
//!
//! Exactly one process group may read from and write to the terminal, and it
//! is the group that receives the terminal-generated signals (Ctrl-C, Ctrl-Z,
//! Ctrl-\). The shell hands that ownership to a foreground job for the length
//! of its wait and always takes it back afterwards.

use std::fmt;
use std::os::unix::io::RawFd;

use failure::ResultExt;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, Pid};

use crate::errors::{ErrorKind, Result};
use crate::util;

/// Signals the terminal generates for job control. The shell ignores them so
/// they only affect the foreground job; children restore the defaults.
pub const JOB_CONTROL_SIGNALS: [Signal; 5] = [
    Signal::SIGTSTP,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

pub trait Terminal: fmt::Debug {
    /// Returns `true` if a real controlling terminal is being arbitrated.
    fn is_interactive(&self) -> bool;

    /// Descriptor a foreground child uses to claim the terminal for its own
    /// group before exec. `None` when there is nothing to claim.
    fn child_fd(&self) -> Option<RawFd>;

    /// The shell's own process group, the fallback owner of the terminal.
    fn shell_pgid(&self) -> Pid;

    /// Makes `pgid` the terminal's foreground process group.
    fn claim_foreground(&mut self, pgid: Pid) -> Result<()>;

    /// Gives the terminal back to the shell's process group.
    fn return_foreground_to_shell(&mut self) -> Result<()>;
}

/// The terminal attached to the shell's stdin.
#[derive(Debug)]
pub struct ControllingTerminal {
    fd: RawFd,
    shell_pgid: Pid,
}

impl ControllingTerminal {
    /// Puts the shell in the foreground of its terminal, in a process group
    /// of its own, with the job-control signals ignored.
    ///
    /// Any failure here means job control cannot work and is fatal to the
    /// shell.
    pub fn initialize() -> Result<Self> {
        let fd = util::get_terminal();

        // Loop until the shell is in the foreground. SIGTTIN stops us until
        // whoever owns the terminal continues us in the foreground.
        loop {
            let shell_pgid = unistd::getpgrp();
            if unistd::tcgetpgrp(fd).context(ErrorKind::JobControlInit)? == shell_pgid {
                break;
            }
            signal::kill(Pid::from_raw(-shell_pgid.as_raw()), Signal::SIGTTIN)
                .context(ErrorKind::JobControlInit)?;
        }

        // Put ourselves in our own process group
        let shell_pgid = unistd::getpid();
        if unistd::getpgrp() != shell_pgid {
            unistd::setpgid(shell_pgid, shell_pgid).context(ErrorKind::JobControlInit)?;
        }

        // Ignore interactive and job-control signals
        for &sig in JOB_CONTROL_SIGNALS.iter() {
            unsafe { signal::signal(sig, SigHandler::SigIgn) }
                .context(ErrorKind::JobControlInit)?;
        }

        let mut terminal = ControllingTerminal { fd, shell_pgid };
        terminal
            .claim_foreground(shell_pgid)
            .context(ErrorKind::JobControlInit)?;

        info!("job control initialized, shell pgid {}", shell_pgid);
        Ok(terminal)
    }
}

impl Terminal for ControllingTerminal {
    fn is_interactive(&self) -> bool {
        true
    }

    fn child_fd(&self) -> Option<RawFd> {
        Some(self.fd)
    }

    fn shell_pgid(&self) -> Pid {
        self.shell_pgid
    }

    fn claim_foreground(&mut self, pgid: Pid) -> Result<()> {
        debug!("setting terminal process group to {}", pgid);
        unistd::tcsetpgrp(self.fd, pgid).context(ErrorKind::Nix)?;
        Ok(())
    }

    fn return_foreground_to_shell(&mut self) -> Result<()> {
        debug!("putting shell back into foreground");
        unistd::tcsetpgrp(self.fd, self.shell_pgid).context(ErrorKind::Nix)?;
        Ok(())
    }
}

/// Stand-in used when stdin is not a terminal: there is no ownership to
/// hand around, so every transfer trivially succeeds.
#[derive(Debug)]
pub struct NoTerminal {
    shell_pgid: Pid,
}

impl NoTerminal {
    pub fn new() -> Self {
        NoTerminal {
            shell_pgid: unistd::getpgrp(),
        }
    }
}

impl Default for NoTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for NoTerminal {
    fn is_interactive(&self) -> bool {
        false
    }

    fn child_fd(&self) -> Option<RawFd> {
        None
    }

    fn shell_pgid(&self) -> Pid {
        self.shell_pgid
    }

    fn claim_foreground(&mut self, _pgid: Pid) -> Result<()> {
        Ok(())
    }

    fn return_foreground_to_shell(&mut self) -> Result<()> {
        Ok(())
    }
}

/// RAII struct that gives a job the terminal for as long as it lives.
///
/// Dropping the guard returns the terminal to the shell, whatever happened
/// while waiting for the job.
pub struct ForegroundGuard<'a> {
    terminal: &'a mut dyn Terminal,
}

impl<'a> ForegroundGuard<'a> {
    pub fn new(terminal: &'a mut dyn Terminal, pgid: Pid) -> Self {
        let temp_result = terminal.claim_foreground(pgid);
        log_if_err!(temp_result, "failed to give terminal to process group {}", pgid);
        ForegroundGuard { terminal }
    }
}

impl<'a> Drop for ForegroundGuard<'a> {
    fn drop(&mut self) {
        let temp_result = self.terminal.return_foreground_to_shell();
        log_if_err!(temp_result, "failed to return terminal to shell");
    }
}

impl<'a> fmt::Debug for ForegroundGuard<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ForegroundGuard({:?})", self.terminal)
    }
}
