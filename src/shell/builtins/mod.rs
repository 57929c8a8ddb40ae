//! Psh builtins
//!
//! Commands the shell runs itself, without forking. Argument errors are
//! reported the way the C-shell family reports them: a one line message and a
//! nonzero status.

use std::iter;

use docopt::Docopt;
use failure::Fail;
use serde;

use self::prelude::*;

use self::dirs::{Cd, Pwd};
use self::exit::Exit;
use self::help::Help;
use self::jobs::{Bg, Fg, Jobs, Wait};

pub mod prelude {
    pub use std::io::Write;
    pub use std::process::ExitStatus;

    pub use failure::ResultExt;

    pub use super::parse_args;
    pub use crate::errors::{Error, ErrorKind, Result};
    pub use crate::shell::shell::Shell;
    pub use crate::util::PshExitStatusExt;
}

mod dirs;
mod exit;
mod help;
mod jobs;

const BG_NAME: &str = "bg";
const CD_NAME: &str = "cd";
const EXIT_NAME: &str = "exit";
const FG_NAME: &str = "fg";
const HELP_NAME: &str = "?";
const JOBS_NAME: &str = "jobs";
const PWD_NAME: &str = "pwd";
const WAIT_NAME: &str = "wait";

/// Represents a Psh builtin command such as cd or fg.
pub trait BuiltinCommand {
    /// The NAME of the command.
    const NAME: &'static str;
    /// The help string to display to the user.
    ///
    /// The first line is the usage, the second a one line summary.
    const HELP: &'static str;
    /// The usage string to display to the user.
    fn usage() -> &'static str {
        Self::HELP.lines().next().unwrap_or(Self::NAME)
    }
    /// The one line description listed by `?`.
    fn summary() -> &'static str {
        Self::HELP.lines().nth(1).map_or("", str::trim)
    }
    /// Runs the command with the given arguments in the `shell` environment.
    fn run<T: AsRef<str>>(shell: &mut Shell, args: &[T], stdout: &mut dyn Write)
        -> Result<ExitStatus>;
}

pub fn is_builtin<T: AsRef<str>>(program: T) -> bool {
    [
        BG_NAME, CD_NAME, EXIT_NAME, FG_NAME, HELP_NAME, JOBS_NAME, PWD_NAME, WAIT_NAME,
    ]
    .contains(&program.as_ref())
}

/// precondition: command is a builtin.
/// Returns (`exit_status`, `builtin_result`)
pub fn run<S1, S2>(
    shell: &mut Shell,
    program: S1,
    args: &[S2],
    stdout: &mut dyn Write,
) -> (ExitStatus, Result<()>)
where
    S1: AsRef<str>,
    S2: AsRef<str>,
{
    debug_assert!(is_builtin(&program));

    let result = match program.as_ref() {
        BG_NAME => Bg::run(shell, args, stdout),
        CD_NAME => Cd::run(shell, args, stdout),
        EXIT_NAME => Exit::run(shell, args, stdout),
        FG_NAME => Fg::run(shell, args, stdout),
        HELP_NAME => Help::run(shell, args, stdout),
        JOBS_NAME => Jobs::run(shell, args, stdout),
        PWD_NAME => Pwd::run(shell, args, stdout),
        WAIT_NAME => Wait::run(shell, args, stdout),
        _ => unreachable!(),
    };

    match result {
        Ok(exit_status) => (exit_status, Ok(())),
        Err(e) => (get_builtin_exit_status(&e), Err(e)),
    }
}

fn get_builtin_exit_status(error: &Error) -> ExitStatus {
    let status = match *error.kind() {
        ErrorKind::BuiltinCommand { code, .. } => code,
        _ => 1,
    };

    ExitStatus::from_status(status)
}

pub fn parse_args<'de, D, S, I>(usage: &str, program: S, args: I) -> Result<D>
where
    D: serde::Deserialize<'de>,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    Docopt::new(usage)
        .and_then(|d| d.argv(iter::once(program).chain(args)).deserialize())
        .map_err(|e| {
            let message = e.to_string();
            e.context(ErrorKind::Docopt(message)).into()
        })
}
