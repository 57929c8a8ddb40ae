//! Psh - Shell Module
//!
//! The Shell reads command lines, runs builtins itself and hands everything
//! else to its job manager.

use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::process::{self, ExitStatus};

use failure::ResultExt;
use nix::unistd::Pid;

use crate::core::job::Job;
use crate::core::parser::{self, Command};
use crate::editor::Editor;
use crate::errors::{Error, ErrorKind, Result};
use crate::shell::{
    builtins,
    job_control::JobManager,
    terminal::{ControllingTerminal, NoTerminal, Terminal},
    ShellConfig,
};
use crate::util::{self, PshExitStatusExt};

const SYNTAX_ERROR_EXIT_STATUS: i32 = 2;
const COMMAND_NOT_FOUND_EXIT_STATUS: i32 = 127;

/// Psh Shell
pub struct Shell {
    /// Responsible for reading lines and history.
    editor: Editor,
    job_manager: JobManager,
    /// Exit status of last command executed.
    last_exit_status: ExitStatus,
    config: ShellConfig,
    /// Is `true` if stdin was a terminal at startup.
    is_interactive: bool,
    /// Number shown in the prompt.
    line_count: u32,
}

impl Shell {
    /// Constructs a new Shell. When job control is enabled and stdin is a
    /// terminal, the shell takes over the terminal; failing to do so is
    /// fatal.
    pub fn new(config: ShellConfig) -> Result<Shell> {
        let is_interactive = util::isatty();
        let terminal: Box<dyn Terminal> = if config.enable_job_control && is_interactive {
            Box::new(ControllingTerminal::initialize()?)
        } else {
            Box::new(NoTerminal::new())
        };

        let mut shell = Shell::with_terminal(config, terminal);
        shell.is_interactive = is_interactive;
        if config.enable_command_history && is_interactive {
            shell.editor = Editor::with_capacity(config.command_history_capacity);
        }

        info!("psh started up");
        Ok(shell)
    }

    /// Constructs a Shell whose jobs compete for `terminal`, reading lines
    /// from stdin without line editing.
    pub fn with_terminal(config: ShellConfig, terminal: Box<dyn Terminal>) -> Shell {
        Shell {
            editor: Editor::plain(),
            is_interactive: terminal.is_interactive(),
            job_manager: JobManager::new(terminal),
            last_exit_status: ExitStatus::from_success(),
            config,
            line_count: 0,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.is_interactive
    }

    pub fn last_exit_status(&self) -> ExitStatus {
        self.last_exit_status
    }

    /// The prompt is only shown to a person at a terminal.
    fn prompt(&mut self) -> Result<Option<String>> {
        let prompt = if self.is_interactive {
            format!("{}: ", self.line_count)
        } else {
            String::new()
        };
        self.editor.readline(&prompt)
    }

    /// Runs one command line.
    ///
    /// Errors caused by the line itself are reported on stderr and recorded
    /// in the exit status; only failures of the shell are returned.
    pub fn execute_command_string(&mut self, input: &str) -> Result<()> {
        let words = match parser::split_line(input) {
            Ok(words) => words,
            Err(e) => return self.report_syntax_error(e),
        };

        // skip if empty
        if words.is_empty() {
            return Ok(());
        }

        if self.config.enable_command_history {
            self.editor.add_history_entry(input.trim());
        }

        if builtins::is_builtin(&words[0]) {
            self.execute_builtin(&words);
            return Ok(());
        }

        let command = match Command::new(input, words) {
            Ok(command) => command,
            Err(e) => return self.report_syntax_error(e),
        };
        self.execute_command(command)
    }

    /// Runs a psh script from a file, one command per line.
    pub fn execute_commands_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let f = File::open(path).context(ErrorKind::Io)?;
        for line in BufReader::new(f).lines() {
            let line = line.context(ErrorKind::Io)?;
            self.execute_command_string(&line)?;
            self.do_job_notification();
        }

        Ok(())
    }

    /// Runs command lines from stdin until EOF is received.
    pub fn execute_from_stdin(&mut self) {
        loop {
            let input = match self.prompt() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("failed to read line: {}", e);
                    break;
                }
            };

            let temp_result = self.execute_command_string(&input);
            log_if_err!(temp_result, "execute_command_string");
            if let Err(e) = temp_result {
                eprintln!("psh: {}", e);
            }

            self.do_job_notification();
            self.line_count += 1;
        }
    }

    fn execute_builtin(&mut self, words: &[String]) {
        let program = &words[0];
        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        let (exit_status, result) = builtins::run(self, program, &words[1..], &mut stdout);
        let _ = stdout.flush();

        if let Err(e) = result {
            match *e.kind() {
                ErrorKind::BuiltinCommand { .. } | ErrorKind::Docopt(_) => eprintln!("psh: {}", e),
                _ => eprintln!("psh: {}: {}", program, e),
            }
        }
        self.last_exit_status = exit_status;
    }

    /// Registers, launches and waits for (or backgrounds) an external
    /// command.
    fn execute_command(&mut self, command: Command) -> Result<()> {
        let job_id = match self.job_manager.create_job(command) {
            Ok(job_id) => job_id,
            Err(e) => {
                let code = match *e.kind() {
                    ErrorKind::CommandNotFound(_) => COMMAND_NOT_FOUND_EXIT_STATUS,
                    ErrorKind::Redirect(_) => 1,
                    _ => return Err(e),
                };
                eprintln!("psh: {}", e);
                self.last_exit_status = ExitStatus::from_status(code);
                return Ok(());
            }
        };

        let pid = match self.job_manager.launch_job(job_id) {
            Ok(pid) => pid,
            Err(e) => {
                error!("failed to launch job [{}]: {}", job_id, e);
                eprintln!("psh: {}", e);
                self.last_exit_status = ExitStatus::from_failure();
                return Ok(());
            }
        };

        if self.job_manager.is_background(job_id) {
            println!("[{}] {}", job_id, pid);
            self.last_exit_status = ExitStatus::from_success();
        } else {
            self.last_exit_status = self.job_manager.put_job_in_foreground(pid, false)?;
        }

        Ok(())
    }

    fn report_syntax_error(&mut self, e: Error) -> Result<()> {
        match *e.kind() {
            ErrorKind::Syntax(_) | ErrorKind::LineTooLong(_) => {
                eprintln!("psh: {}", e);
                self.last_exit_status = ExitStatus::from_status(SYNTAX_ERROR_EXIT_STATUS);
                Ok(())
            }
            _ => Err(e),
        }
    }

    fn do_job_notification(&mut self) {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        self.job_manager.do_job_notification(&mut stdout);
        let _ = stdout.flush();
    }

    /// Returns the jobs that have not completed.
    pub fn get_jobs(&self) -> Vec<&Job> {
        self.job_manager.get_jobs()
    }

    /// Continues the job with process `pid` in the foreground.
    pub fn put_job_in_foreground(&mut self, pid: Pid) -> Result<ExitStatus> {
        self.job_manager.put_job_in_foreground(pid, true /* cont */)
    }

    /// Continues the job with process `pid` in the background.
    pub fn put_job_in_background(&mut self, pid: Pid) -> Result<()> {
        self.job_manager.put_job_in_background(pid, true /* cont */)
    }

    /// Waits for every job to complete. Returns `false` if some never did.
    pub fn wait_for_all_jobs(&mut self) -> Result<bool> {
        self.job_manager.wait_for_all_jobs()
    }

    /// Exit the shell with `exit_status`.
    pub fn exit(&mut self, exit_status: ExitStatus) -> ! {
        if self.config.display_messages && self.is_interactive {
            println!("exit");
        }

        let _ = io::stdout().flush();
        info!("psh has shut down");
        process::exit(exit_status.code().unwrap_or(1));
    }
}

impl fmt::Debug for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}\n{:?}", self.job_manager, self.editor)
    }
}
