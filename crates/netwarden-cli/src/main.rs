use anyhow::{Context, Result};
use clap::Parser;
use netwarden_cli::args::{Cli, Command};
use netwarden_cli::commands;
use netwarden_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    commands::init_logging(cli.verbose, &config);

    match cli.command {
        Command::Serve {
            bind,
            mcp_stdio,
            mcp_sse_bind,
        } => commands::serve::run(config, bind, mcp_stdio, mcp_sse_bind).await,
        Command::Scan { networks, wait } => commands::scan::run(config, networks, wait).await,
        Command::Db { action } => commands::db::run(config, action).await,
    }
}
