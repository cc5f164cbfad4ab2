//! qlik-cli plumbing: input validation, argument vectors, process execution
//! and output parsing.
//!
//! Every external call goes through [`runner::ProcessRunner`] with a
//! structured argument vector (never a shell string), a timeout and, where
//! needed, secret redaction.

pub mod command;
pub mod output;
pub mod runner;
pub mod validate;

pub use command::CommandBuilder;
pub use runner::{CommandResult, ProcessRunner, TokioProcessRunner};
pub use validate::ExportFormat;
