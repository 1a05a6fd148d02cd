use crate::row::{bool_to_int, int_to_bool, parse_ip};
use crate::{map_sqlx, Store};
use chrono::{DateTime, Utc};
use netwarden_core::{
    Error, Host, HostScanStatus, ParsedHost, ParsedPort, Port, Protocol, Result, ScriptOutputs,
    TracerouteHop,
};
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(sqlx::FromRow)]
struct RawHostRow {
    id: i64,
    scan_id: i64,
    ip: String,
    hostname: Option<String>,
    mac: Option<String>,
    vendor: Option<String>,
    os: Option<String>,
    os_accuracy: Option<i64>,
    is_vm: i64,
    vm_type: Option<String>,
    uptime_seconds: Option<i64>,
    last_boot: Option<String>,
    distance: Option<i64>,
    cpe: Option<String>,
    scan_status: String,
    scan_started_at: Option<DateTime<Utc>>,
    scan_completed_at: Option<DateTime<Utc>>,
    scan_progress_percent: i64,
    scan_error_message: Option<String>,
    ports_discovered: i64,
    external_pid: Option<i64>,
}

impl RawHostRow {
    fn into_host(self) -> Result<Host> {
        Ok(Host {
            id: self.id,
            scan_id: self.scan_id,
            ip: parse_ip(&self.ip)?,
            hostname: self.hostname,
            mac: self.mac,
            vendor: self.vendor,
            os: self.os,
            os_accuracy: self.os_accuracy.map(|v| v as i32),
            is_vm: int_to_bool(self.is_vm),
            vm_type: self.vm_type,
            uptime_seconds: self.uptime_seconds,
            last_boot: self.last_boot,
            distance: self.distance.map(|v| v as i32),
            cpe: self.cpe,
            scan_status: HostScanStatus::from_str(&self.scan_status)?,
            scan_started_at: self.scan_started_at,
            scan_completed_at: self.scan_completed_at,
            scan_progress_percent: self.scan_progress_percent as i32,
            scan_error_message: self.scan_error_message,
            ports_discovered: self.ports_discovered as i32,
            external_pid: self.external_pid,
        })
    }
}

const SELECT_HOST: &str = "SELECT id, scan_id, ip, hostname, mac, vendor, os, os_accuracy, \
     is_vm, vm_type, uptime_seconds, last_boot, distance, cpe, scan_status, scan_started_at, \
     scan_completed_at, scan_progress_percent, scan_error_message, ports_discovered, external_pid \
     FROM hosts";

#[derive(sqlx::FromRow)]
struct RawPortRow {
    id: i64,
    host_id: i64,
    port: i64,
    protocol: String,
    service: Option<String>,
    product: Option<String>,
    version: Option<String>,
    extrainfo: Option<String>,
    cpe: Option<String>,
    script_output: Option<String>,
}

impl RawPortRow {
    fn into_port(self) -> Result<Port> {
        Ok(Port {
            id: self.id,
            host_id: self.host_id,
            port: self.port as u16,
            protocol: Protocol::from_str(&self.protocol)?,
            service: self.service,
            product: self.product,
            version: self.version,
            extrainfo: self.extrainfo,
            cpe: self.cpe,
            script_output: self
                .script_output
                .map(|raw| serde_json::from_str(&raw))
                .transpose()
                .map_err(|e| Error::Store(format!("corrupt script_output json: {e}")))?,
        })
    }
}

impl Store {
    /// Registers the discovery-phase host list for `scan_id`, one pending
    /// row per address. Enumeration (phase 2) updates these rows in place
    /// rather than inserting new ones.
    pub async fn seed_discovered_hosts(&self, scan_id: i64, ips: &[std::net::Ipv4Addr]) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx)?;
        for ip in ips {
            sqlx::query(
                "INSERT INTO hosts (scan_id, ip, scan_status, scan_progress_percent, \
                 ports_discovered) VALUES (?, ?, 'pending', 0, 0) \
                 ON CONFLICT(scan_id, ip) DO NOTHING",
            )
            .bind(scan_id)
            .bind(ip.to_string())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }
        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    pub async fn get_host(&self, id: i64) -> Result<Option<Host>> {
        let row = sqlx::query_as::<_, RawHostRow>(&format!("{SELECT_HOST} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx)?;
        row.map(RawHostRow::into_host).transpose()
    }

    pub async fn get_host_by_ip(&self, scan_id: i64, ip: std::net::Ipv4Addr) -> Result<Option<Host>> {
        let row = sqlx::query_as::<_, RawHostRow>(&format!(
            "{SELECT_HOST} WHERE scan_id = ? AND ip = ?"
        ))
        .bind(scan_id)
        .bind(ip.to_string())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx)?;
        row.map(RawHostRow::into_host).transpose()
    }

    pub async fn list_hosts_for_scan(&self, scan_id: i64) -> Result<Vec<Host>> {
        let rows = sqlx::query_as::<_, RawHostRow>(&format!(
            "{SELECT_HOST} WHERE scan_id = ? ORDER BY ip"
        ))
        .bind(scan_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;
        rows.into_iter().map(RawHostRow::into_host).collect()
    }

    /// All pending hosts for a scan, in ascending IP order — the enumeration
    /// worklist a scan run pulls from.
    pub async fn list_pending_hosts(&self, scan_id: i64) -> Result<Vec<Host>> {
        let rows = sqlx::query_as::<_, RawHostRow>(&format!(
            "{SELECT_HOST} WHERE scan_id = ? AND scan_status = 'pending' ORDER BY ip"
        ))
        .bind(scan_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;
        rows.into_iter().map(RawHostRow::into_host).collect()
    }

    pub async fn begin_host_scan(&self, host_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE hosts SET scan_status = 'scanning', scan_started_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(host_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    /// Records (or clears) the pid of the per-host scanner process, so the
    /// watchdog can target it directly instead of matching command lines.
    pub async fn set_host_pid(&self, host_id: i64, pid: Option<i64>) -> Result<()> {
        sqlx::query("UPDATE hosts SET external_pid = ? WHERE id = ?")
            .bind(pid)
            .bind(host_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    pub async fn update_host_scan_progress(&self, host_id: i64, percent: i32) -> Result<()> {
        sqlx::query("UPDATE hosts SET scan_progress_percent = ? WHERE id = ?")
            .bind(percent)
            .bind(host_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    pub async fn fail_host_scan(&self, host_id: i64, error_message: &str) -> Result<()> {
        sqlx::query(
            "UPDATE hosts SET scan_status = 'failed', scan_completed_at = ?, \
             scan_error_message = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(error_message)
        .bind(host_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    /// Persists a single host's parsed enumeration result: updates the host
    /// row's fingerprint fields and replaces its ports and traceroute hops.
    /// Hosts with no meaningful data (`ParsedHost::has_meaningful_data`) are
    /// still marked completed — filtering them out of reports, not the
    /// database, is the orchestrator's job (phase 4). Idempotent: the
    /// orchestrator calls this once from the per-host worker and again after
    /// reconciliation (phase 5), so old ports/hops are cleared first rather
    /// than appended to.
    pub async fn complete_host_scan(&self, host_id: i64, parsed: &ParsedHost) -> Result<()> {
        let mut tx = self.pool().begin().await.map_err(map_sqlx)?;
        let now = Utc::now();

        sqlx::query("DELETE FROM ports WHERE host_id = ?")
            .bind(host_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        sqlx::query("DELETE FROM traceroute_hops WHERE host_id = ?")
            .bind(host_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

        sqlx::query(
            "UPDATE hosts SET scan_status = 'completed', scan_progress_percent = 100, \
             scan_completed_at = ?, hostname = ?, mac = ?, vendor = ?, os = ?, os_accuracy = ?, \
             is_vm = ?, vm_type = ?, uptime_seconds = ?, last_boot = ?, distance = ?, cpe = ?, \
             ports_discovered = ? WHERE id = ?",
        )
        .bind(now)
        .bind(&parsed.hostname)
        .bind(&parsed.mac)
        .bind(&parsed.vendor)
        .bind(&parsed.os)
        .bind(parsed.os_accuracy)
        .bind(bool_to_int(parsed.is_vm))
        .bind(&parsed.vm_type)
        .bind(parsed.uptime_seconds)
        .bind(&parsed.last_boot)
        .bind(parsed.distance)
        .bind(&parsed.cpe)
        .bind(parsed.ports.len() as i64)
        .bind(host_id)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx)?;

        for port in &parsed.ports {
            insert_port(&mut tx, host_id, port).await?;
        }
        for (i, hop) in parsed.traceroute.iter().enumerate() {
            sqlx::query(
                "INSERT INTO traceroute_hops (host_id, hop_number, ip, hostname, rtt_ms) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(host_id)
            .bind(i as i64 + 1)
            .bind(&hop.ip)
            .bind(&hop.hostname)
            .bind(hop.rtt_ms)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }

        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    pub async fn list_ports_for_host(&self, host_id: i64) -> Result<Vec<Port>> {
        let rows = sqlx::query_as::<_, RawPortRow>(
            "SELECT id, host_id, port, protocol, service, product, version, extrainfo, cpe, \
             script_output FROM ports WHERE host_id = ? ORDER BY protocol, port",
        )
        .bind(host_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;
        rows.into_iter().map(RawPortRow::into_port).collect()
    }

    pub async fn list_traceroute_for_host(&self, host_id: i64) -> Result<Vec<TracerouteHop>> {
        sqlx::query_as::<_, (i64, i64, i64, Option<String>, Option<String>, Option<f64>)>(
            "SELECT id, host_id, hop_number, ip, hostname, rtt_ms FROM traceroute_hops \
             WHERE host_id = ? ORDER BY hop_number",
        )
        .bind(host_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)
        .map(|rows| {
            rows.into_iter()
                .map(|(id, host_id, hop_number, ip, hostname, rtt_ms)| TracerouteHop {
                    id,
                    host_id,
                    hop_number: hop_number as i32,
                    ip,
                    hostname,
                    rtt_ms,
                })
                .collect()
        })
    }

    /// Latest host row per distinct IP across every scan, in ascending
    /// natural IPv4 numeric order. Ties on IP are broken by the most recent
    /// scan (highest `scan_id`).
    pub async fn unique_hosts(&self) -> Result<Vec<Host>> {
        let rows = sqlx::query_as::<_, RawHostRow>(&format!(
            "{SELECT_HOST} WHERE id IN ( \
                 SELECT id FROM hosts h2 WHERE h2.scan_id = ( \
                     SELECT MAX(scan_id) FROM hosts h3 WHERE h3.ip = h2.ip \
                 ) AND h2.id = ( \
                     SELECT MAX(id) FROM hosts h4 WHERE h4.ip = h2.ip AND h4.scan_id = h2.scan_id \
                 ) \
             )"
        ))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;

        let mut hosts = rows
            .into_iter()
            .map(RawHostRow::into_host)
            .collect::<Result<Vec<_>>>()?;
        hosts.sort_by_key(|h| u32::from(h.ip));
        Ok(hosts)
    }

    /// Same as [`Store::unique_hosts`] but restricted to devices classified
    /// as virtual machines.
    pub async fn unique_vms(&self) -> Result<Vec<Host>> {
        Ok(self
            .unique_hosts()
            .await?
            .into_iter()
            .filter(|h| h.is_vm)
            .collect())
    }

    /// Backdates a host's `scan_started_at` for watchdog tests that need to
    /// simulate a long-running per-host scan without sleeping in real time.
    #[cfg(feature = "test-support")]
    pub async fn backdate_host_scan_start_for_test(
        &self,
        host_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE hosts SET scan_started_at = ? WHERE id = ?")
            .bind(started_at)
            .bind(host_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    /// Drops every host row for `scan_id` whose IP is not in `surviving_ips`
    /// — phase 4's filter (hosts lacking open ports, OS, and MAC are noise,
    /// not findings) applied to the database, not just the report.
    pub async fn delete_hosts_not_in(
        &self,
        scan_id: i64,
        surviving_ips: &[std::net::Ipv4Addr],
    ) -> Result<()> {
        let all = self.list_hosts_for_scan(scan_id).await?;
        let keep: std::collections::HashSet<_> = surviving_ips.iter().collect();
        let mut tx = self.pool().begin().await.map_err(map_sqlx)?;
        for host in all.iter().filter(|h| !keep.contains(&h.ip)) {
            sqlx::query("DELETE FROM hosts WHERE id = ?")
                .bind(host.id)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
        }
        tx.commit().await.map_err(map_sqlx)?;
        Ok(())
    }

    /// Groups every port ever observed by `(service, product, version)`,
    /// recording the set of host IPs each combination was seen on.
    pub async fn services_rollup(&self) -> Result<Vec<ServiceGroup>> {
        let rows: Vec<(Option<String>, Option<String>, Option<String>, String)> = sqlx::query_as(
            "SELECT p.service, p.product, p.version, h.ip FROM ports p \
             JOIN hosts h ON h.id = p.host_id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx)?;

        let mut groups: BTreeMap<(Option<String>, Option<String>, Option<String>), Vec<String>> =
            BTreeMap::new();
        for (service, product, version, ip) in rows {
            let entry = groups.entry((service, product, version)).or_default();
            if !entry.contains(&ip) {
                entry.push(ip);
            }
        }

        let mut out: Vec<ServiceGroup> = groups
            .into_iter()
            .map(|((service, product, version), mut ips)| {
                ips.sort_by_key(|ip| {
                    std::net::Ipv4Addr::from_str(ip)
                        .map(u32::from)
                        .unwrap_or(u32::MAX)
                });
                ServiceGroup {
                    service,
                    product,
                    version,
                    host_ips: ips,
                }
            })
            .collect();
        out.sort_by(|a, b| (&a.service, &a.product, &a.version).cmp(&(&b.service, &b.product, &b.version)));
        Ok(out)
    }
}

/// One `(service, product, version)` bucket and the hosts it was seen on.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceGroup {
    pub service: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
    pub host_ips: Vec<String>,
}

async fn insert_port(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    host_id: i64,
    port: &ParsedPort,
) -> Result<()> {
    let script_output = if port.script_output.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&port.script_output as &ScriptOutputs).map_err(|e| {
            Error::Store(format!("failed to serialize script output: {e}"))
        })?)
    };

    sqlx::query(
        "INSERT INTO ports (host_id, port, protocol, service, product, version, extrainfo, \
         cpe, script_output) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(host_id)
    .bind(port.port as i64)
    .bind(port.protocol.to_string())
    .bind(&port.service)
    .bind(&port.product)
    .bind(&port.version)
    .bind(&port.extrainfo)
    .bind(&port.cpe)
    .bind(script_output)
    .execute(&mut **tx)
    .await
    .map_err(map_sqlx)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use netwarden_core::ParsedPort;
    use std::net::Ipv4Addr;

    async fn seeded_scan_with_host(store: &Store) -> (i64, i64) {
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
        (scan.id, host.id)
    }

    #[tokio::test]
    async fn seed_is_idempotent_under_conflicting_ip() {
        let store = Store::connect_memory().await.unwrap();
        let (scan_id, _) = seeded_scan_with_host(&store).await;
        store
            .seed_discovered_hosts(scan_id, &[Ipv4Addr::new(10, 0, 0, 5)])
            .await
            .unwrap();
        assert_eq!(store.list_hosts_for_scan(scan_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn complete_host_scan_persists_ports_and_marks_completed() {
        let store = Store::connect_memory().await.unwrap();
        let (_scan_id, host_id) = seeded_scan_with_host(&store).await;

        let parsed = ParsedHost {
            ip: Ipv4Addr::new(10, 0, 0, 5),
            os: Some("Linux".to_string()),
            ports: vec![ParsedPort {
                port: 22,
                protocol: Protocol::Tcp,
                service: Some("ssh".to_string()),
                product: Some("OpenSSH".to_string()),
                version: Some("9.3".to_string()),
                extrainfo: None,
                cpe: None,
                script_output: ScriptOutputs::new(),
            }],
            ..Default::default()
        };
        store.complete_host_scan(host_id, &parsed).await.unwrap();

        let host = store.get_host(host_id).await.unwrap().unwrap();
        assert_eq!(host.scan_status, HostScanStatus::Completed);
        assert_eq!(host.ports_discovered, 1);

        let ports = store.list_ports_for_host(host_id).await.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].service.as_deref(), Some("ssh"));
    }

    #[tokio::test]
    async fn unique_hosts_orders_by_numeric_ip_not_string() {
        let store = Store::connect_memory().await.unwrap();
        let scan = store.create_scan("10.0.0.0/24", None).await.unwrap();
        // Lexicographic string order would put "10.0.0.10" before "10.0.0.9".
        store
            .seed_discovered_hosts(
                scan.id,
                &[Ipv4Addr::new(10, 0, 0, 10), Ipv4Addr::new(10, 0, 0, 9)],
            )
            .await
            .unwrap();

        let hosts = store.unique_hosts().await.unwrap();
        assert_eq!(hosts[0].ip, Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(hosts[1].ip, Ipv4Addr::new(10, 0, 0, 10));
    }

    #[tokio::test]
    async fn delete_hosts_not_in_drops_unfiltered_survivors() {
        let store = Store::connect_memory().await.unwrap();
        let scan = store.create_scan("10.0.0.0/24", None).await.unwrap();
        store
            .seed_discovered_hosts(
                scan.id,
                &[Ipv4Addr::new(10, 0, 0, 5), Ipv4Addr::new(10, 0, 0, 6)],
            )
            .await
            .unwrap();

        store
            .delete_hosts_not_in(scan.id, &[Ipv4Addr::new(10, 0, 0, 5)])
            .await
            .unwrap();

        let remaining = store.list_hosts_for_scan(scan.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].ip, Ipv4Addr::new(10, 0, 0, 5));
    }
}
