//! Wraps the external port-scanner tool (subprocess supervision, XML
//! parsing) and classifies discovered hosts as physical or virtual.

mod classifier;
mod dns;
mod netdetect;
mod parser;
mod subprocess;
mod xml;

pub use classifier::classify;
pub use dns::reverse_lookup;
pub use netdetect::{detect_local_network, detect_local_network_cidr};
pub use parser::parse_report;
pub use subprocess::ScanRunner;

use netwarden_core::{ParsedHost, Result};
use std::net::Ipv4Addr;
use std::path::PathBuf;

impl ScanRunner {
    /// Runs discovery against `cidr` and returns the raw report path plus the
    /// IPs judged "live": status up and at least one open port. ICMP-only
    /// responders are filtered out — the downstream pipeline needs at least
    /// one port signal to be worth a full per-host scan.
    pub async fn discover_live_hosts(
        &self,
        cidr: &str,
        scan_id: i64,
        on_spawn: impl FnOnce(u32),
    ) -> Result<(PathBuf, Vec<Ipv4Addr>)> {
        let path = self.discover(cidr, scan_id, on_spawn).await?;
        let bytes = std::fs::read(&path)?;
        let hosts = parse_report(&bytes)?;
        let live = hosts
            .into_iter()
            .filter(|h| !h.ports.is_empty())
            .map(|h| h.ip)
            .collect();
        Ok((path, live))
    }

    /// Scans a single host and returns its one parsed record, with the VM
    /// classifier already applied.
    pub async fn scan_and_parse_host(
        &self,
        ip: Ipv4Addr,
        scan_id: i64,
        on_spawn: impl FnOnce(u32),
    ) -> Result<ParsedHost> {
        let path = self.scan_host(ip, scan_id, on_spawn).await?;
        let bytes = std::fs::read(&path)?;
        let mut hosts = parse_report(&bytes)?;
        let mut host = hosts.pop().ok_or_else(|| {
            netwarden_core::Error::Parse(format!("scan report for {ip} contained no host"))
        })?;
        let (is_vm, vm_type) = classify(&host);
        host.is_vm = is_vm;
        host.vm_type = vm_type;
        if host.hostname.is_none() {
            host.hostname = reverse_lookup(ip).await;
        }
        Ok(host)
    }
}
