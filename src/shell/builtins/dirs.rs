use std::env;

use crate::shell::builtins::{self, prelude::*};

pub struct Pwd;

impl builtins::BuiltinCommand for Pwd {
    const NAME: &'static str = builtins::PWD_NAME;

    const HELP: &'static str = "\
pwd: pwd
    print the current working directory path";

    fn run<T: AsRef<str>>(
        _shell: &mut Shell,
        args: &[T],
        stdout: &mut dyn Write,
    ) -> Result<ExitStatus> {
        if !args.is_empty() {
            return Err(Error::builtin_command(
                "pwd does not take command line arguments",
                1,
            ));
        }

        let cwd = env::current_dir().context(ErrorKind::Io)?;
        writeln!(stdout, "{}", cwd.display()).context(ErrorKind::Io)?;
        Ok(ExitStatus::from_success())
    }
}

pub struct Cd;

impl builtins::BuiltinCommand for Cd {
    const NAME: &'static str = builtins::CD_NAME;

    const HELP: &'static str = "\
cd: cd <dir>
    change current working directory to specified path";

    fn run<T: AsRef<str>>(
        _shell: &mut Shell,
        args: &[T],
        _stdout: &mut dyn Write,
    ) -> Result<ExitStatus> {
        let dir = match args {
            [dir] => dir.as_ref(),
            _ => {
                return Err(Error::builtin_command(
                    "cd requires a single directory path",
                    1,
                ))
            }
        };

        if let Err(e) = env::set_current_dir(dir) {
            return Err(Error::builtin_command(format!("cd: {}: {}", dir, e), 1));
        }
        debug!("changed directory to {}", dir);
        Ok(ExitStatus::from_success())
    }
}
