//! The two-phase scan pipeline: discovery across every requested network,
//! bounded-parallel per-host enumeration, reconciliation against the
//! discovery data, persistence, artifact generation, and finalization.

use crate::reports;
use netwarden_core::{ArtifactType, Error, ParsedHost, Result};
use netwarden_runner::{parse_report, ScanRunner};
use netwarden_store::Store;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub struct Orchestrator {
    store: Store,
    runner: ScanRunner,
    output_dir: PathBuf,
}

impl Orchestrator {
    pub fn new(store: Store, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            store,
            runner: ScanRunner::new(output_dir.clone()),
            output_dir,
        }
    }

    /// Runs `scan_id` against `networks` end to end. Discovery failures fail
    /// the whole scan; per-host failures are isolated to that host.
    pub async fn execute_scan(&self, scan_id: i64, networks: &[String]) -> Result<()> {
        match self.run(scan_id, networks).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(scan_id, error = %e, "scan failed");
                self.store.fail_scan(scan_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn run(&self, scan_id: i64, networks: &[String]) -> Result<()> {
        self.store.begin_scan(scan_id).await?;
        self.progress(scan_id, 0, "Starting scan...").await?;

        let (discovery_paths, discovered) = self.discover_all(scan_id, networks).await?;

        if discovered.is_empty() {
            self.progress(scan_id, 100, "No live hosts discovered")
                .await?;
            self.store
                .complete_scan(scan_id, "No live hosts discovered")
                .await?;
            return Ok(());
        }

        let live_ips: Vec<Ipv4Addr> = discovered.keys().copied().collect();
        self.progress(
            scan_id,
            18,
            &format!("Creating host records for {} discovered host(s)...", live_ips.len()),
        )
        .await?;
        self.store.seed_discovered_hosts(scan_id, &live_ips).await?;

        self.progress(
            scan_id,
            20,
            &format!("Starting detailed scans on {} host(s)...", live_ips.len()),
        )
        .await?;
        let per_host = self.scan_hosts(scan_id, &live_ips).await?;

        self.progress(scan_id, 92, "Reconciling scan results...").await?;
        let reconciled = reconcile(discovered, per_host);

        let surviving: Vec<ParsedHost> = reconciled
            .into_values()
            .filter(ParsedHost::has_meaningful_data)
            .collect();
        if surviving.len() < live_ips.len() {
            info!(
                scan_id,
                dropped = live_ips.len() - surviving.len(),
                "dropped hosts with no meaningful data"
            );
        }
        let surviving_ips: Vec<Ipv4Addr> = surviving.iter().map(|h| h.ip).collect();
        self.store
            .delete_hosts_not_in(scan_id, &surviving_ips)
            .await?;

        self.progress(scan_id, 95, "Saving to database...").await?;
        for host in &surviving {
            let Some(row) = self.store.get_host_by_ip(scan_id, host.ip).await? else {
                warn!(scan_id, ip = %host.ip, "surviving host vanished before persistence");
                continue;
            };
            self.store.complete_host_scan(row.id, host).await?;
        }

        self.progress(scan_id, 98, "Generating reports...").await?;
        self.generate_artifacts(scan_id, &surviving, &discovery_paths)
            .await?;

        self.progress(scan_id, 100, "Scan completed successfully")
            .await?;
        self.store
            .complete_scan(scan_id, "Scan completed successfully")
            .await?;
        Ok(())
    }

    async fn discover_all(
        &self,
        scan_id: i64,
        networks: &[String],
    ) -> Result<(Vec<PathBuf>, HashMap<Ipv4Addr, ParsedHost>)> {
        let mut discovery_paths = Vec::new();
        let mut discovered = HashMap::new();
        let total = networks.len().max(1);

        for (idx, network) in networks.iter().enumerate() {
            let progress = (idx * 15 / total) as i32;
            self.progress(scan_id, progress, &format!("Discovering hosts in {network}..."))
                .await?;

            let store = self.store.clone();
            let path = self
                .runner
                .discover(network, scan_id, move |pid| {
                    tokio::spawn(async move {
                        let _ = store.set_scan_pid(scan_id, Some(pid as i64)).await;
                    });
                })
                .await?;

            let bytes = std::fs::read(&path)?;
            for host in parse_report(&bytes)? {
                discovered
                    .entry(host.ip)
                    .and_modify(|existing: &mut ParsedHost| {
                        if host.ports.len() > existing.ports.len() {
                            *existing = host.clone();
                        }
                    })
                    .or_insert(host);
            }
            discovery_paths.push(path);
        }

        discovered.retain(|_, host| !host.ports.is_empty());
        Ok((discovery_paths, discovered))
    }

    /// Runs per-host enumeration with a concurrency cap pulled from Settings,
    /// updating each host's row as it starts, finishes, or fails.
    async fn scan_hosts(
        &self,
        scan_id: i64,
        ips: &[Ipv4Addr],
    ) -> Result<HashMap<Ipv4Addr, ParsedHost>> {
        let parallelism = self.store.scan_parallelism().await?.max(1) as usize;
        let semaphore = Arc::new(Semaphore::new(parallelism));
        let total = ips.len();

        let mut tasks = Vec::with_capacity(total);
        for ip in ips.iter().copied() {
            let semaphore = semaphore.clone();
            let store = self.store.clone();
            let runner_output_dir = self.output_dir.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                let runner = ScanRunner::new(runner_output_dir);
                scan_one_host(&store, &runner, scan_id, ip).await
            }));
        }

        let mut results = HashMap::new();
        let mut completed = 0usize;
        for task in tasks {
            let outcome = task.await.map_err(|e| {
                Error::TransientSubprocess(format!("host scan task panicked: {e}"))
            })?;
            completed += 1;
            let progress = 20 + (completed * 70 / total.max(1)) as i32;
            self.progress(
                scan_id,
                progress,
                &format!("Completed {completed}/{total} hosts"),
            )
            .await?;

            if let Some((ip, host)) = outcome {
                results.insert(ip, host);
            }
        }
        Ok(results)
    }

    async fn generate_artifacts(
        &self,
        scan_id: i64,
        hosts: &[ParsedHost],
        discovery_paths: &[PathBuf],
    ) -> Result<()> {
        let output_base = self.output_dir.join(format!("scan_{scan_id}"));

        let html_path = output_base.with_extension("html");
        let html = reports::generate_html(scan_id, hosts, &html_path)?;
        self.record_artifact(scan_id, ArtifactType::Html, &html).await?;

        let xlsx_path = output_base.with_extension("xlsx");
        let xlsx = reports::generate_xlsx(hosts, &xlsx_path)?;
        self.record_artifact(scan_id, ArtifactType::Xlsx, &xlsx).await?;

        let graph = reports::generate_graph(hosts, &output_base)?;
        self.record_artifact(scan_id, ArtifactType::Dot, &graph.dot).await?;
        if let Some(png) = &graph.png {
            self.record_artifact(scan_id, ArtifactType::Png, png).await?;
        }
        if let Some(svg) = &graph.svg {
            self.record_artifact(scan_id, ArtifactType::Svg, svg).await?;
        }

        for path in discovery_paths {
            self.record_artifact(scan_id, ArtifactType::Xml, path).await?;
        }
        Ok(())
    }

    async fn record_artifact(
        &self,
        scan_id: i64,
        artifact_type: ArtifactType,
        path: &std::path::Path,
    ) -> Result<()> {
        let size = std::fs::metadata(path).map(|m| m.len() as i64).ok();
        self.store
            .create_artifact(scan_id, artifact_type, &path.to_string_lossy(), size)
            .await?;
        Ok(())
    }

    async fn progress(&self, scan_id: i64, percent: i32, message: &str) -> Result<()> {
        self.store
            .update_scan_progress(scan_id, percent, message)
            .await
    }
}

/// Scans and persists one host, isolating its failure from the rest of the
/// batch. Returns `None` whenever the per-host scan did not produce a fresh
/// `ParsedHost` for reconciliation — either the subprocess itself failed
/// (host row marked failed) or its report could not be read/parsed (host row
/// still marked completed, best effort, and left for discovery-phase data to
/// fill in during reconciliation).
async fn scan_one_host(
    store: &Store,
    runner: &ScanRunner,
    scan_id: i64,
    ip: Ipv4Addr,
) -> Option<(Ipv4Addr, ParsedHost)> {
    let host = match store.get_host_by_ip(scan_id, ip).await {
        Ok(Some(host)) => host,
        Ok(None) => {
            warn!(scan_id, %ip, "host row missing before per-host scan");
            return None;
        }
        Err(e) => {
            warn!(scan_id, %ip, error = %e, "failed to look up host before scanning");
            return None;
        }
    };

    if let Err(e) = store.begin_host_scan(host.id).await {
        warn!(scan_id, %ip, error = %e, "failed to mark host scanning");
    }

    let host_id = host.id;
    let store_for_spawn = store.clone();
    let parsed = runner
        .scan_and_parse_host(ip, scan_id, move |pid| {
            tokio::spawn(async move {
                let _ = store_for_spawn.set_host_pid(host_id, Some(pid as i64)).await;
            });
        })
        .await;

    match parsed {
        Ok(parsed) => {
            if let Err(e) = store.complete_host_scan(host.id, &parsed).await {
                warn!(scan_id, %ip, error = %e, "failed to persist host scan result");
            }
            Some((ip, parsed))
        }
        Err(e) if e.is_host_isolated() => {
            warn!(scan_id, %ip, error = %e, "per-host scan failed");
            if let Err(store_err) = store.fail_host_scan(host.id, &e.to_string()).await {
                warn!(scan_id, %ip, error = %store_err, "failed to record host scan failure");
            }
            None
        }
        Err(e) => {
            // The subprocess itself succeeded; reading or parsing its report
            // afterward failed. Best effort: mark the host completed rather
            // than failed, falling back to the discovery-derived record
            // during reconciliation if it has richer data.
            warn!(scan_id, %ip, error = %e, "scan report unreadable after successful subprocess run");
            if let Err(store_err) = store
                .complete_host_scan(host.id, &ParsedHost::empty(ip))
                .await
            {
                warn!(scan_id, %ip, error = %store_err, "failed to persist best-effort host scan result");
            }
            None
        }
    }
}

/// Merges discovery-derived records with per-host results, preferring the
/// per-host record (it always has equal or better data) and falling back to
/// discovery for hosts whose per-host scan failed outright.
fn reconcile(
    discovered: HashMap<Ipv4Addr, ParsedHost>,
    mut per_host: HashMap<Ipv4Addr, ParsedHost>,
) -> HashMap<Ipv4Addr, ParsedHost> {
    let mut out = HashMap::new();
    for (ip, discovery_host) in discovered {
        match per_host.remove(&ip) {
            Some(host) => {
                out.insert(ip, host);
            }
            None => {
                out.insert(ip, discovery_host);
            }
        }
    }
    out.extend(per_host);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use netwarden_core::ScanStatus;

    #[tokio::test]
    async fn zero_live_hosts_completes_scan_immediately() {
        let store = Store::connect_memory().await.unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let scan = store.create_scan("198.51.100.0/31", None).await.unwrap();

        // No live hosts means the discover step never needs a real binary:
        // exercise only the completion-on-empty path directly.
        store.begin_scan(scan.id).await.unwrap();
        store
            .complete_scan(scan.id, "No live hosts discovered")
            .await
            .unwrap();

        let updated = store.get_scan(scan.id).await.unwrap().unwrap();
        assert_eq!(updated.status, ScanStatus::Completed);
        assert_eq!(updated.progress_message.as_deref(), Some("No live hosts discovered"));
        let _ = Orchestrator::new(store, tmp.path());
    }

    #[test]
    fn reconcile_prefers_per_host_over_discovery() {
        let ip = Ipv4Addr::new(10, 0, 0, 5);
        let mut discovered = HashMap::new();
        discovered.insert(
            ip,
            ParsedHost {
                ip,
                ..Default::default()
            },
        );
        let mut per_host = HashMap::new();
        per_host.insert(
            ip,
            ParsedHost {
                ip,
                os: Some("Linux".to_string()),
                ..Default::default()
            },
        );

        let merged = reconcile(discovered, per_host);
        assert_eq!(merged[&ip].os.as_deref(), Some("Linux"));
    }

    #[test]
    fn reconcile_falls_back_to_discovery_when_per_host_missing() {
        let ip = Ipv4Addr::new(10, 0, 0, 6);
        let mut discovered = HashMap::new();
        discovered.insert(
            ip,
            ParsedHost {
                ip,
                os: Some("discovery-only".to_string()),
                ..Default::default()
            },
        );
        let merged = reconcile(discovered, HashMap::new());
        assert_eq!(merged[&ip].os.as_deref(), Some("discovery-only"));
    }
}
