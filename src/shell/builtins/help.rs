use crate::shell::builtins::{
    self, prelude::*, BuiltinCommand, Bg, Cd, Exit, Fg, Jobs, Pwd, Wait,
};

pub struct Help;

impl BuiltinCommand for Help {
    const NAME: &'static str = builtins::HELP_NAME;

    const HELP: &'static str = "\
?: ?
    show this help menu";

    fn run<T: AsRef<str>>(
        _shell: &mut Shell,
        _args: &[T],
        stdout: &mut dyn Write,
    ) -> Result<ExitStatus> {
        let summaries = [
            (Help::NAME, Help::summary()),
            (Exit::NAME, Exit::summary()),
            (Pwd::NAME, Pwd::summary()),
            (Cd::NAME, Cd::summary()),
            (Wait::NAME, Wait::summary()),
            (Fg::NAME, Fg::summary()),
            (Bg::NAME, Bg::summary()),
            (Jobs::NAME, Jobs::summary()),
        ];
        for (name, summary) in summaries.iter() {
            writeln!(stdout, "{} - {}", name, summary).context(ErrorKind::Io)?;
        }

        Ok(ExitStatus::from_success())
    }
}
