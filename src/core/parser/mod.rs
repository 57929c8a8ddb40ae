//! PSH Parser
//!
//! Grammar of a command line:
//!
//! ```text
//! word... ['<' file] ['>' file] ['&']
//! ```
//!
//! A redirection operator and its filename are two separate words. `&` marks
//! a background job only when it is the entire final word.

use crate::errors::{Error, ErrorKind, Result};

pub mod tokenizer;

/// Longest command line accepted, in bytes (newline excluded).
pub const MAX_LINE_LENGTH: usize = 4096;

const BACKGROUND_MARKER: &str = "&";
const STDIN_REDIRECT: &str = "<";
const STDOUT_REDIRECT: &str = ">";

/// Splits a raw input line into words, enforcing the line length limit.
pub fn split_line(input: &str) -> Result<Vec<String>> {
    let line = input.trim_end_matches(|c| c == '\n' || c == '\r');
    if line.len() > MAX_LINE_LENGTH {
        return Err(Error::from(ErrorKind::LineTooLong(line.len())));
    }
    tokenizer::tokenize(line)
}

/// An external command ready to be registered as a job.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    /// The original line entered.
    pub input: String,
    /// Program followed by its arguments, with redirections and `&` removed.
    pub argv: Vec<String>,
    pub stdin: Option<String>,
    pub stdout: Option<String>,
    pub background: bool,
}

impl Command {
    /// Builds a command from the words of `input`, consuming the background
    /// marker and the redirection pairs.
    pub fn new(input: &str, mut words: Vec<String>) -> Result<Self> {
        let background = words.last().map_or(false, |w| w == BACKGROUND_MARKER);
        if background {
            words.pop();
        }

        let mut argv = Vec::with_capacity(words.len());
        let mut stdin = None;
        let mut stdout = None;
        let mut words = words.into_iter();
        while let Some(word) = words.next() {
            let slot = match word.as_str() {
                STDIN_REDIRECT => &mut stdin,
                STDOUT_REDIRECT => &mut stdout,
                _ => {
                    argv.push(word);
                    continue;
                }
            };

            match (slot.is_some(), words.next()) {
                (false, Some(file)) => *slot = Some(file),
                _ => return Err(Error::syntax(input.trim())),
            }
        }

        if argv.is_empty() {
            return Err(Error::syntax(input.trim()));
        }

        let command = Command {
            input: input.trim().to_string(),
            argv,
            stdin,
            stdout,
            background,
        };
        debug!("parsed Command: {:?}", command);
        Ok(command)
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }
}
