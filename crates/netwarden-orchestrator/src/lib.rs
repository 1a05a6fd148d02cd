//! Orchestrates scans end to end: authentication/password policy, the
//! discover-then-enumerate scan pipeline, report generation, the cron
//! scheduler, and the stuck-scan watchdog.

pub mod auth;
pub mod orchestrator;
pub mod reports;
pub mod scheduler;
pub mod watchdog;

pub use auth::{Auth, LoginResult, TokenPair};
pub use orchestrator::Orchestrator;
pub use reports::GraphOutputs;
pub use scheduler::{run_retention_cleanup, Scheduler};
pub use watchdog::{Diagnostics, Watchdog};
