//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod config;
pub mod dock;
pub mod init;
pub mod run;
pub mod status;
pub mod structures;
