use nix::unistd::Pid;

use crate::shell::builtins::{self, prelude::*};
use crate::shell::job_control::NO_JOB_PID;

pub struct Jobs;

#[derive(Debug, Deserialize)]
struct JobsArgs {
    flag_p: bool,
}

impl builtins::BuiltinCommand for Jobs {
    const NAME: &'static str = builtins::JOBS_NAME;

    const HELP: &'static str = "\
jobs: jobs [-p]
    list the jobs that have not completed

Usage:
    jobs [-p]

Options:
    -p      lists process IDs only";

    fn run<T: AsRef<str>>(
        shell: &mut Shell,
        args: &[T],
        stdout: &mut dyn Write,
    ) -> Result<ExitStatus> {
        let args: JobsArgs = parse_args(Self::HELP, Self::NAME, args.iter().map(AsRef::as_ref))?;
        debug!("{:?}", args);

        for job in shell.get_jobs() {
            if args.flag_p {
                if let Some(pid) = job.process_id() {
                    writeln!(stdout, "{}", pid).context(ErrorKind::Io)?;
                }
            } else {
                writeln!(stdout, "{}", job).context(ErrorKind::Io)?;
            }
        }

        Ok(ExitStatus::from_success())
    }
}

pub struct Fg;

impl builtins::BuiltinCommand for Fg {
    const NAME: &'static str = builtins::FG_NAME;

    const HELP: &'static str = "\
fg: fg [pid]
    bring specified program with pid to terminal foreground";

    fn run<T: AsRef<str>>(
        shell: &mut Shell,
        args: &[T],
        _stdout: &mut dyn Write,
    ) -> Result<ExitStatus> {
        let pid = parse_pid(Self::NAME, args)?;
        shell.put_job_in_foreground(pid)
    }
}

pub struct Bg;

impl builtins::BuiltinCommand for Bg {
    const NAME: &'static str = builtins::BG_NAME;

    const HELP: &'static str = "\
bg: bg [pid]
    continue execution of specified program with pid in background";

    fn run<T: AsRef<str>>(
        shell: &mut Shell,
        args: &[T],
        _stdout: &mut dyn Write,
    ) -> Result<ExitStatus> {
        let pid = parse_pid(Self::NAME, args)?;
        shell.put_job_in_background(pid)?;
        Ok(ExitStatus::from_success())
    }
}

pub struct Wait;

impl builtins::BuiltinCommand for Wait {
    const NAME: &'static str = builtins::WAIT_NAME;

    const HELP: &'static str = "\
wait: wait
    wait for all background processes to complete";

    fn run<T: AsRef<str>>(
        shell: &mut Shell,
        args: &[T],
        _stdout: &mut dyn Write,
    ) -> Result<ExitStatus> {
        if !args.is_empty() {
            return Err(Error::builtin_command(
                "wait does not take any cmd line arguments",
                1,
            ));
        }

        if shell.wait_for_all_jobs()? {
            Ok(ExitStatus::from_success())
        } else {
            Err(Error::builtin_command(
                "wait: gave up waiting for background jobs",
                1,
            ))
        }
    }
}

/// The pid named by `fg` or `bg`. Anything that is not a pid names no job.
fn parse_pid<T: AsRef<str>>(name: &str, args: &[T]) -> Result<Pid> {
    match args {
        [] => Ok(NO_JOB_PID),
        [arg] => arg
            .as_ref()
            .parse::<i32>()
            .map(Pid::from_raw)
            .map_err(|_| Error::no_such_job(arg.as_ref())),
        _ => Err(Error::builtin_command(
            format!("{} takes at most one pid", name),
            1,
        )),
    }
}
