use std::sync::Arc;

use anyhow::{Context, Result};
use netwarden_api::AppState;
use netwarden_core::Config;
use netwarden_orchestrator::{Auth, Scheduler};
use netwarden_store::Store;
use tracing::info;

use crate::banner::Banner;

pub async fn run(
    config: Config,
    bind: String,
    mcp_stdio: bool,
    mcp_sse_bind: Option<String>,
) -> Result<()> {
    Banner::new(env!("CARGO_PKG_VERSION")).print();

    let output_dir = config.ensure_output_dir().context("preparing scan output directory")?;

    let store = Store::connect(&config.database_url)
        .await
        .context("connecting to store")?;

    Auth::new(&store, &config)
        .bootstrap_admin()
        .await
        .context("bootstrapping initial admin account")?;

    let scheduler = Arc::new(
        Scheduler::new(store.clone(), output_dir.clone())
            .await
            .context("building scheduler")?,
    );
    scheduler.start().await.context("starting scheduler")?;

    let state = AppState {
        store,
        config: Arc::new(config),
        output_dir,
        scheduler,
    };

    let router = netwarden_api::build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("binding HTTP listener on {bind}"))?;
    info!(%bind, "HTTP API listening");

    let http = async move {
        axum::serve(listener, router)
            .await
            .context("HTTP server exited")
    };

    let mcp_sse_state = state.clone();
    let mcp_sse = async move {
        if let Some(addr) = mcp_sse_bind {
            let socket_addr = addr.parse().context("parsing --mcp-sse-bind address")?;
            info!(%addr, "MCP SSE transport listening");
            netwarden_api::mcp::serve_sse(mcp_sse_state, socket_addr).await?;
        }
        Ok::<(), anyhow::Error>(())
    };

    let mcp_stdio_task = async move {
        if mcp_stdio {
            info!("MCP stdio transport active");
            netwarden_api::mcp::serve_stdio(state).await?;
        }
        Ok::<(), anyhow::Error>(())
    };

    tokio::try_join!(http, mcp_sse, mcp_stdio_task)?;
    Ok(())
}
