use std::fmt;
use std::io::{self, BufRead, Write};

use failure::{Fail, ResultExt};
use rustyline::{
    self,
    completion::{Completer, FilenameCompleter, Pair},
    error::ReadlineError,
    highlight::Highlighter,
    hint::Hinter,
    validate::Validator,
    CompletionType, Config, Helper,
};

use crate::errors::{ErrorKind, Result};

struct EditorHelper(FilenameCompleter);

impl Completer for EditorHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        ctx: &rustyline::Context<'_>,
    ) -> ::std::result::Result<(usize, Vec<Pair>), ReadlineError> {
        self.0.complete(line, pos, ctx)
    }
}

impl Hinter for EditorHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &rustyline::Context<'_>) -> Option<Self::Hint> {
        None
    }
}

impl Highlighter for EditorHelper {}

impl Helper for EditorHelper {}

impl Validator for EditorHelper {}

/// Source of command lines: a line editor on a terminal, plain buffered
/// reads from stdin otherwise.
pub struct Editor {
    /// `None` when reading without line editing.
    internal: Option<rustyline::Editor<EditorHelper>>,
    /// The total number of history items ever saved
    history_count: usize,
}

impl Editor {
    /// An editor with an in-memory history of `history_capacity` entries.
    pub fn with_capacity(history_capacity: usize) -> Editor {
        let config = Config::builder()
            .max_history_size(history_capacity)
            .history_ignore_space(true)
            .completion_type(CompletionType::Circular)
            .build();

        let mut internal = rustyline::Editor::with_config(config);
        internal.set_helper(Some(EditorHelper(FilenameCompleter::new())));

        Editor {
            internal: Some(internal),
            history_count: 0,
        }
    }

    /// An editor that reads stdin line by line without echo or history.
    pub fn plain() -> Editor {
        Editor {
            internal: None,
            history_count: 0,
        }
    }

    /// Reads the next line. Returns `None` at end of input.
    pub fn readline(&mut self, prompt: &str) -> Result<Option<String>> {
        let internal = match self.internal {
            Some(ref mut internal) => internal,
            None => return read_plain_line(prompt),
        };

        match internal.readline(prompt) {
            Ok(line) => Ok(Some(line)),
            Err(ReadlineError::Eof) => Ok(None),
            // Ctrl-C abandons the line being edited.
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(e) => Err(e.context(ErrorKind::Readline).into()),
        }
    }

    pub fn add_history_entry(&mut self, line: &str) {
        if let Some(ref mut internal) = self.internal {
            if internal.add_history_entry(line) {
                self.history_count += 1;
            }
        }
    }

    pub fn get_history_count(&self) -> usize {
        self.history_count
    }
}

fn read_plain_line(prompt: &str) -> Result<Option<String>> {
    if !prompt.is_empty() {
        print!("{}", prompt);
        io::stdout().flush().context(ErrorKind::Io)?;
    }

    let mut line = String::new();
    let stdin = io::stdin();
    match stdin.lock().read_line(&mut line).context(ErrorKind::Io)? {
        0 => Ok(None),
        _ => Ok(Some(line)),
    }
}

impl fmt::Debug for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "line editing: {}", self.internal.is_some())?;
        write!(f, "count: {}", self.get_history_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_count_tracks_new_entries() {
        let mut editor = Editor::with_capacity(10);
        editor.add_history_entry("ls");
        editor.add_history_entry("pwd");
        assert_eq!(editor.get_history_count(), 2);

        // consecutive duplicates are not saved twice
        editor.add_history_entry("pwd");
        assert_eq!(editor.get_history_count(), 2);
    }

    #[test]
    fn plain_editor_keeps_no_history() {
        let mut editor = Editor::plain();
        editor.add_history_entry("ls");
        assert_eq!(editor.get_history_count(), 0);
    }
}
