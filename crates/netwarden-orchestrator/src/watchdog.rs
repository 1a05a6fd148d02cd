//! Detects scans and hosts stuck in a non-terminal state and terminates them
//! with a diagnostic error message, killing any lingering scanner process.

use chrono::Utc;
use netwarden_core::{Result, Scan, ScanStatus};
use netwarden_store::Store;
use sysinfo::{Pid, System};
use tracing::warn;

const MAX_SCAN_RUNTIME_HOURS: i64 = 6;
const MAX_STALLED_MINUTES: i64 = 30;
const MAX_PENDING_AGE_HOURS: i64 = 1;
const MAX_HOST_SCANNING_MINUTES: i64 = 10;

/// Diagnostic snapshot of why a scan looked stuck, logged alongside the
/// failure so an operator can tell transient slowness from a real hang.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub total_hosts: i64,
    pub pending_hosts: i64,
    pub scanning_hosts: i64,
    pub failed_hosts: i64,
    pub completed_hosts: i64,
    pub stuck_scanning_hosts: Vec<(String, i64)>,
    pub external_pids_found: Vec<u32>,
    pub issues: Vec<String>,
}

pub struct Watchdog<'a> {
    store: &'a Store,
}

impl<'a> Watchdog<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Scans every active (pending/running) scan, marking the stuck ones
    /// failed. Returns how many were fixed.
    pub async fn sweep(&self) -> Result<u32> {
        let now = Utc::now();
        let mut fixed = 0;

        for scan in self.store.list_active_scans().await? {
            if let Some(reason) = self.is_stuck(&scan, now) {
                let diagnostics = self.diagnose(&scan).await?;
                warn!(scan_id = scan.id, ?reason, ?diagnostics, "stuck scan detected");

                self.kill_external(&scan, &diagnostics).await;

                let message = format!(
                    "Scan timeout: {reason}. Issues: {}",
                    diagnostics.issues.join(", ")
                );
                self.store.fail_scan(scan.id, &message).await?;
                fixed += 1;
            }
        }
        Ok(fixed)
    }

    fn is_stuck(&self, scan: &Scan, now: chrono::DateTime<Utc>) -> Option<String> {
        if let Some(started_at) = scan.started_at {
            let runtime_hours = (now - started_at).num_minutes() as f64 / 60.0;
            if runtime_hours > MAX_SCAN_RUNTIME_HOURS as f64 {
                return Some(format!(
                    "exceeded maximum runtime ({runtime_hours:.1}h)"
                ));
            }
        }

        let since_update = now - scan.updated_at;
        if since_update.num_minutes() > MAX_STALLED_MINUTES {
            return Some(format!(
                "no progress for {} minutes",
                since_update.num_minutes()
            ));
        }

        if scan.status == ScanStatus::Pending {
            let age = now - scan.created_at;
            if age.num_hours() >= MAX_PENDING_AGE_HOURS {
                return Some("stuck in pending state for over 1 hour".to_string());
            }
        }

        None
    }

    /// Builds the same diagnostic picture the original monitor logged,
    /// without mutating anything.
    pub async fn diagnose(&self, scan: &Scan) -> Result<Diagnostics> {
        let hosts = self.store.list_hosts_for_scan(scan.id).await?;
        let mut diag = Diagnostics {
            total_hosts: hosts.len() as i64,
            ..Default::default()
        };

        let now = Utc::now();
        for host in &hosts {
            use netwarden_core::HostScanStatus::*;
            match host.scan_status {
                Pending => diag.pending_hosts += 1,
                Scanning => {
                    diag.scanning_hosts += 1;
                    if let Some(started) = host.scan_started_at {
                        let minutes = (now - started).num_minutes();
                        if minutes > MAX_HOST_SCANNING_MINUTES {
                            diag.stuck_scanning_hosts.push((host.ip.to_string(), minutes));
                        }
                    }
                }
                Failed => diag.failed_hosts += 1,
                Completed => diag.completed_hosts += 1,
            }
        }
        if !diag.stuck_scanning_hosts.is_empty() {
            diag.issues.push(format!(
                "{} host(s) stuck in scanning state for >{} minutes",
                diag.stuck_scanning_hosts.len(),
                MAX_HOST_SCANNING_MINUTES
            ));
        }

        diag.external_pids_found = find_scanner_pids(scan.id);
        if !diag.external_pids_found.is_empty() {
            diag.issues.push(format!(
                "{} scanner process(es) still running",
                diag.external_pids_found.len()
            ));
        }

        if let Some(started_at) = scan.started_at {
            let runtime_hours = (now - started_at).num_minutes() as f64 / 60.0;
            if runtime_hours > MAX_SCAN_RUNTIME_HOURS as f64 {
                diag.issues.push(format!(
                    "total runtime {runtime_hours:.1}h exceeds max {MAX_SCAN_RUNTIME_HOURS}h"
                ));
            }
        }

        Ok(diag)
    }

    /// Kills any scanner process belonging to this scan: the recorded pid
    /// first, falling back to matching `scan_{id}` in the command line for
    /// processes the runner never got the chance to record.
    async fn kill_external(&self, scan: &Scan, diagnostics: &Diagnostics) {
        let mut system = System::new();
        system.refresh_processes();

        let mut targets: Vec<u32> = diagnostics.external_pids_found.clone();
        if let Some(pid) = scan.external_pid {
            targets.push(pid as u32);
        }
        targets.sort_unstable();
        targets.dedup();

        for pid in targets {
            if let Some(process) = system.process(Pid::from_u32(pid)) {
                if process.kill() {
                    warn!(scan_id = scan.id, pid, "killed stuck scanner process");
                } else {
                    warn!(scan_id = scan.id, pid, "failed to kill stuck scanner process");
                }
            }
        }
    }
}

/// Finds running scanner processes whose command line references
/// `scan_{scan_id}` — the output-file naming convention the runner uses.
fn find_scanner_pids(scan_id: i64) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes();

    let needle = format!("scan_{scan_id}");
    system
        .processes()
        .values()
        .filter(|process| {
            process
                .name()
                .to_lowercase()
                .contains("nmap")
                && process
                    .cmd()
                    .iter()
                    .any(|arg| arg.contains(&needle))
        })
        .map(|process| process.pid().as_u32())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn sweep_fails_pending_scan_stuck_over_an_hour() {
        let store = Store::connect_memory().await.unwrap();
        let scan = store.create_scan("10.0.0.0/24", None).await.unwrap();
        let stale = Utc::now() - chrono::Duration::hours(2);
        store
            .backdate_scan_for_test(scan.id, stale, stale)
            .await
            .unwrap();

        let watchdog = Watchdog::new(&store);
        let fixed = watchdog.sweep().await.unwrap();
        assert_eq!(fixed, 1);

        let updated = store.get_scan(scan.id).await.unwrap().unwrap();
        assert_eq!(updated.status, ScanStatus::Failed);
        assert!(updated.error_message.unwrap().contains("no progress"));
    }

    #[tokio::test]
    async fn sweep_leaves_healthy_scan_alone() {
        let store = Store::connect_memory().await.unwrap();
        let scan = store.create_scan("10.0.0.0/24", None).await.unwrap();
        store.begin_scan(scan.id).await.unwrap();

        let watchdog = Watchdog::new(&store);
        let fixed = watchdog.sweep().await.unwrap();
        assert_eq!(fixed, 0);

        let unchanged = store.get_scan(scan.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, ScanStatus::Running);
    }

    #[tokio::test]
    async fn diagnose_flags_hosts_stuck_scanning() {
        let store = Store::connect_memory().await.unwrap();
        let scan = store.create_scan("10.0.0.0/24", None).await.unwrap();
        store
            .seed_discovered_hosts(scan.id, &[Ipv4Addr::new(10, 0, 0, 5)])
            .await
            .unwrap();
        let host = store
            .get_host_by_ip(scan.id, Ipv4Addr::new(10, 0, 0, 5))
            .await
            .unwrap()
            .unwrap();
        store.begin_host_scan(host.id).await.unwrap();
        store
            .backdate_host_scan_start_for_test(host.id, Utc::now() - chrono::Duration::minutes(20))
            .await
            .unwrap();

        let watchdog = Watchdog::new(&store);
        let diag = watchdog.diagnose(&scan).await.unwrap();
        assert_eq!(diag.stuck_scanning_hosts.len(), 1);
    }
}
