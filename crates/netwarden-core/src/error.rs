//! Error taxonomy shared across every Netwarden crate.

use thiserror::Error;

/// Top-level error type returned by core, store, runner, and orchestrator operations.
///
/// Each variant maps to one of the error kinds in the specification's error
/// taxonomy (transient subprocess failure, parse failure, store error, …).
/// The API crate maps these onto HTTP status codes; the CLI prints the
/// `Display` form directly.
#[derive(Debug, Error)]
pub enum Error {
    /// The external scanning tool could not be launched or its discovery
    /// invocation failed outright. Fails the whole scan.
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// A per-host scan subprocess exited non-zero, could not be spawned, or
    /// otherwise failed. Isolated to the offending host.
    #[error("subprocess failure: {0}")]
    TransientSubprocess(String),

    /// A per-host scan subprocess exceeded its wall-clock budget.
    #[error("subprocess timed out after {0:?}")]
    SubprocessTimeout(std::time::Duration),

    /// The tool produced output but it could not be parsed as the expected
    /// report format.
    #[error("failed to parse scan report: {0}")]
    Parse(String),

    /// A database read or write failed.
    #[error("store error: {0}")]
    Store(String),

    /// Caller-supplied input failed validation (bad CIDR, bad cron, weak
    /// password, duplicate username, …). Always surfaced synchronously.
    #[error("validation error: {0}")]
    Validation(String),

    /// The watchdog judged a scan stuck and terminated it.
    #[error("scan watchdog timeout: {0}")]
    StuckScanTimeout(String),

    /// Bad credentials or an invalid/expired token.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// Wraps an I/O error with a bit of context.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors that are expected to be isolated to a single host and
    /// must never escalate to failing the whole scan.
    pub fn is_host_isolated(&self) -> bool {
        matches!(
            self,
            Error::TransientSubprocess(_) | Error::SubprocessTimeout(_)
        )
    }
}

/// Convenience alias used throughout the Netwarden workspace.
pub type Result<T> = std::result::Result<T, Error>;
