//! Psh - Process-group Shell
//!
//! A line-oriented shell that runs each external command as its own process
//! group and hands the controlling terminal back and forth between itself and
//! its foreground jobs.

#![warn(
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces
)]

#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;

#[macro_use]
mod util;

pub mod core;
mod editor;
pub mod errors;
pub mod shell;

pub use crate::shell::{
    terminal::{ControllingTerminal, NoTerminal, Terminal},
    Shell, ShellConfig,
};
pub use crate::util::PshExitStatusExt;
