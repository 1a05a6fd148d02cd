use anyhow::{Context, Result};
use colored::Colorize;
use netwarden_core::{Config, Scan};
use netwarden_orchestrator::Orchestrator;
use netwarden_runner::detect_local_network_cidr;
use netwarden_store::Store;

pub async fn run(config: Config, networks: Vec<String>, wait: bool) -> Result<()> {
    let output_dir = config.ensure_output_dir().context("preparing scan output directory")?;
    let store = Store::connect(&config.database_url)
        .await
        .context("connecting to store")?;

    let networks = if networks.is_empty() {
        vec![detect_local_network_cidr().context("auto-detecting local network")?]
    } else {
        networks
    };

    let scan = store
        .create_scan(&Scan::join_networks(&networks), None)
        .await
        .context("creating scan record")?;

    println!(
        "{} scan {} over {}",
        "started".green().bold(),
        scan.id,
        networks.join(", ")
    );

    let orchestrator = Orchestrator::new(store.clone(), output_dir);
    if wait {
        orchestrator
            .execute_scan(scan.id, &networks)
            .await
            .context("running scan")?;
        print_final_status(&store, scan.id).await?;
    } else {
        tokio::spawn(async move {
            if let Err(e) = orchestrator.execute_scan(scan.id, &networks).await {
                tracing::error!(scan_id = scan.id, error = %e, "scan failed");
            }
        });
        println!("run `netwarden scan --wait` or the HTTP API to follow progress");
    }

    Ok(())
}

async fn print_final_status(store: &Store, scan_id: i64) -> Result<()> {
    let scan = store
        .get_scan(scan_id)
        .await
        .context("reloading scan")?
        .context("scan vanished after completion")?;

    println!(
        "scan {} finished: {} ({}%) {}",
        scan.id,
        scan.status,
        scan.progress_percent,
        scan.progress_message.as_deref().unwrap_or("")
    );
    Ok(())
}
