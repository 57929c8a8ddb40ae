use crate::shell::builtins::{self, prelude::*};

pub struct Exit;

impl builtins::BuiltinCommand for Exit {
    const NAME: &'static str = builtins::EXIT_NAME;

    const HELP: &'static str = "\
exit: exit
    exit the command shell";

    fn run<T: AsRef<str>>(
        shell: &mut Shell,
        args: &[T],
        _stdout: &mut dyn Write,
    ) -> Result<ExitStatus> {
        if !args.is_empty() {
            return Err(Error::builtin_command(
                "exit does not take command line arguments",
                1,
            ));
        }

        shell.exit(ExitStatus::from_success())
    }
}
