//! Shell data model: parsed command lines, executable lookup and jobs.

pub mod job;
pub mod parser;
pub mod resolve;
