//! Netwarden CLI library.
//!
//! Exposes the argument model and subcommand implementations so integration
//! tests can exercise them without spawning the compiled binary.

pub mod args;
pub mod banner;
pub mod commands;

pub use args::{Cli, Command, DbAction};
