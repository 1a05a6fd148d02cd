//! Command-line argument definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "netwarden", version, about = "Netwarden scan orchestration engine")]
pub struct Cli {
    /// Path to a TOML config file; falls back to defaults and NETWARDEN_* env vars.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API, cron scheduler, and watchdog as a long-lived service.
    Serve {
        /// Address to bind the HTTP API to.
        #[arg(long, default_value = "0.0.0.0:8000")]
        bind: String,

        /// Also expose the MCP query bus over stdio (blocks this process on stdin/stdout).
        #[arg(long)]
        mcp_stdio: bool,

        /// Also expose the MCP query bus over HTTP/SSE at this address.
        #[arg(long)]
        mcp_sse_bind: Option<String>,
    },

    /// Submit an ad hoc scan directly against the store, without the HTTP API.
    Scan {
        /// CIDR network ranges to scan; auto-detects the local network if omitted.
        networks: Vec<String>,

        /// Block until the scan reaches a terminal state, printing progress.
        #[arg(long)]
        wait: bool,
    },

    /// Database maintenance operations.
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
pub enum DbAction {
    /// Apply pending schema migrations (a no-op beyond opening the store, which
    /// migrates on connect; useful for pre-flight checks in deployment scripts).
    Migrate,

    /// Delete scans (and their artifact files) older than the configured
    /// data-retention window, the same cleanup the daily scheduler job runs.
    Cleanup,

    /// Reset a user's password, bypassing the current-password check.
    ResetPassword {
        username: String,
        new_password: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clap_definition_is_internally_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn scan_accepts_multiple_networks_and_wait_flag() {
        let cli = Cli::parse_from([
            "netwarden",
            "scan",
            "10.0.0.0/24",
            "192.168.1.0/24",
            "--wait",
        ]);
        match cli.command {
            Command::Scan { networks, wait } => {
                assert_eq!(networks, vec!["10.0.0.0/24", "192.168.1.0/24"]);
                assert!(wait);
            }
            _ => panic!("expected Scan subcommand"),
        }
    }

    #[test]
    fn db_reset_password_parses_both_positionals() {
        let cli = Cli::parse_from(["netwarden", "db", "reset-password", "alice", "s3cret!"]);
        match cli.command {
            Command::Db {
                action: DbAction::ResetPassword {
                    username,
                    new_password,
                },
            } => {
                assert_eq!(username, "alice");
                assert_eq!(new_password, "s3cret!");
            }
            _ => panic!("expected Db ResetPassword subcommand"),
        }
    }
}
