//! Splits a command line into words.
//!
//! Words are separated by unquoted whitespace. Single and double quotes group
//! characters (whitespace included) into one word and are removed from the
//! result; there are no escapes or expansions inside either kind of quote.

use crate::errors::{Error, Result};

pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(current.split_off(0));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quote.is_some() {
        return Err(Error::syntax(line.trim()));
    }
    if in_word {
        words.push(current);
    }

    Ok(words)
}
