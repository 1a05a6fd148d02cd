//! Core domain types, error taxonomy, and configuration shared by every
//! Netwarden crate: the store, the scan runner, the orchestrator, and the
//! HTTP/MCP API adapters all depend on this crate and nothing else in the
//! workspace.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
