//! MCP query bus: the same Store/Orchestrator data the HTTP API exposes,
//! reachable as named tools over stdio or HTTP/SSE for agent-style clients.
//! Every tool but `start_scan` is a read-only snapshot; nothing here owns
//! business logic beyond formatting.

use std::net::SocketAddr;
use std::sync::Arc;

use netwarden_core::Config;
use netwarden_orchestrator::Scheduler;
use netwarden_store::Store;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{tool, Error as McpError, ServerHandler, ServiceExt};
use serde::Deserialize;
use std::path::PathBuf;

use crate::state::AppState;

#[derive(Clone)]
pub struct NetwardenMcpServer {
    store: Store,
    config: Arc<Config>,
    output_dir: PathBuf,
    scheduler: Arc<Scheduler>,
}

impl From<AppState> for NetwardenMcpServer {
    fn from(state: AppState) -> Self {
        NetwardenMcpServer {
            store: state.store,
            config: state.config,
            output_dir: state.output_dir,
            scheduler: state.scheduler,
        }
    }
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListScansArgs {
    /// Number of newest scans to skip, for pagination.
    #[serde(default)]
    pub skip: i64,
    /// Maximum number of scans to return.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ScanIdArgs {
    /// Scan id returned by `list_scans` or `start_scan`.
    pub scan_id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct QueryHostsArgs {
    /// Case-insensitive substring match against IP or hostname. Omit to list every known host.
    #[serde(default)]
    pub query: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct HostServicesArgs {
    /// IPv4 address of the host to inspect, as recorded on a scan.
    pub host_ip: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SearchServiceArgs {
    /// Case-insensitive substring match against the detected service or product name.
    pub service_name: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ScheduleIdArgs {
    /// Schedule id returned by `list_schedules`.
    pub schedule_id: i64,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct StartScanArgs {
    /// CIDR network ranges to scan, e.g. `["192.168.1.0/24"]`. Omit or leave
    /// empty to auto-detect the local network.
    #[serde(default)]
    pub networks: Option<Vec<String>>,
}

fn text(body: impl Into<String>) -> CallToolResult {
    CallToolResult::success(vec![Content::text(body.into())])
}

fn store_err(e: netwarden_core::Error) -> McpError {
    McpError::internal_error(e.to_string(), None)
}

#[tool(tool_box)]
impl NetwardenMcpServer {
    #[tool(description = "List recorded scans, newest first, with status and progress.")]
    async fn list_scans(
        &self,
        #[tool(aggr)] args: ListScansArgs,
    ) -> Result<CallToolResult, McpError> {
        let scans = self
            .store
            .list_scans(args.skip, args.limit)
            .await
            .map_err(store_err)?;

        if scans.is_empty() {
            return Ok(text("No scans recorded."));
        }

        let mut out = String::new();
        for scan in scans {
            out.push_str(&format!(
                "Scan {}: {} [{}] {}% - {}\n",
                scan.id,
                scan.network_range,
                scan.status,
                scan.progress_percent,
                scan.progress_message.as_deref().unwrap_or("")
            ));
        }
        Ok(text(out))
    }

    #[tool(description = "Get full details for one scan: status, hosts, ports, artifacts.")]
    async fn get_scan_details(
        &self,
        #[tool(aggr)] args: ScanIdArgs,
    ) -> Result<CallToolResult, McpError> {
        let scan = self
            .store
            .get_scan(args.scan_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| McpError::invalid_params("scan not found", None))?;

        let hosts = self
            .store
            .list_hosts_for_scan(args.scan_id)
            .await
            .map_err(store_err)?;

        let mut out = format!(
            "Scan {}: {} [{}] {}%\ncreated: {}\nhosts: {}\n\n",
            scan.id,
            scan.network_range,
            scan.status,
            scan.progress_percent,
            scan.created_at,
            hosts.len()
        );
        for host in &hosts {
            let ports = self
                .store
                .list_ports_for_host(host.id)
                .await
                .map_err(store_err)?;
            out.push_str(&format!(
                "  {} ({}) [{}] - {} open ports\n",
                host.ip,
                host.hostname.as_deref().unwrap_or("unknown"),
                host.scan_status,
                ports.len()
            ));
        }
        Ok(text(out))
    }

    #[tool(description = "Search every known host by IP or hostname substring.")]
    async fn query_hosts(
        &self,
        #[tool(aggr)] args: QueryHostsArgs,
    ) -> Result<CallToolResult, McpError> {
        let hosts = self.store.unique_hosts().await.map_err(store_err)?;
        let needle = args.query.as_deref().map(|s| s.to_lowercase());

        let matches: Vec<_> = hosts
            .into_iter()
            .filter(|h| match &needle {
                None => true,
                Some(n) => {
                    h.ip.to_string().to_lowercase().contains(n.as_str())
                        || h.hostname
                            .as_deref()
                            .map(|hn| hn.to_lowercase().contains(n.as_str()))
                            .unwrap_or(false)
                }
            })
            .collect();

        if matches.is_empty() {
            return Ok(text("No hosts matched."));
        }

        let mut out = String::new();
        for host in matches {
            out.push_str(&format!(
                "{} ({}) - vm: {}\n",
                host.ip,
                host.hostname.as_deref().unwrap_or("unknown"),
                host.is_vm
            ));
        }
        Ok(text(out))
    }

    #[tool(description = "List detected open ports/services for one host, by IP.")]
    async fn get_host_services(
        &self,
        #[tool(aggr)] args: HostServicesArgs,
    ) -> Result<CallToolResult, McpError> {
        let hosts = self.store.unique_hosts().await.map_err(store_err)?;
        let host = hosts
            .into_iter()
            .find(|h| h.ip.to_string() == args.host_ip)
            .ok_or_else(|| McpError::invalid_params("no such host", None))?;

        let ports = self
            .store
            .list_ports_for_host(host.id)
            .await
            .map_err(store_err)?;

        if ports.is_empty() {
            return Ok(text(format!("{} has no recorded ports.", host.ip)));
        }

        let mut out = format!("Services on {}:\n", host.ip);
        for port in ports {
            out.push_str(&format!(
                "  {}/{} {} {}\n",
                port.port,
                port.protocol,
                port.service.as_deref().unwrap_or(""),
                port.product
                    .as_deref()
                    .map(|p| format!("({p} {})", port.version.as_deref().unwrap_or("")))
                    .unwrap_or_default()
            ));
        }
        Ok(text(out))
    }

    #[tool(description = "Aggregate network statistics: scan counts, unique hosts/VMs/services.")]
    async fn get_network_stats(&self) -> Result<CallToolResult, McpError> {
        let stats = self.store.stats().await.map_err(store_err)?;
        Ok(text(format!(
            "Total scans: {}\nScans in last 24h: {}\nFailed scans: {}\nUnique hosts: {}\nUnique VMs: {}\nUnique services: {}\nEnabled schedules: {}",
            stats.total_scans,
            stats.scans_last_24h,
            stats.failed_scans,
            stats.unique_host_count,
            stats.unique_vm_count,
            stats.unique_service_count,
            stats.enabled_schedule_count,
        )))
    }

    #[tool(description = "List every host ever classified as a virtual machine.")]
    async fn list_vms(&self) -> Result<CallToolResult, McpError> {
        let vms = self.store.unique_vms().await.map_err(store_err)?;
        if vms.is_empty() {
            return Ok(text("No virtual machines detected."));
        }
        let mut out = String::new();
        for host in vms {
            out.push_str(&format!(
                "{} ({}) - {}\n",
                host.ip,
                host.hostname.as_deref().unwrap_or("unknown"),
                host.vm_type.as_deref().unwrap_or("unknown vm type")
            ));
        }
        Ok(text(out))
    }

    #[tool(description = "Find hosts running a service or product matching a substring.")]
    async fn search_service(
        &self,
        #[tool(aggr)] args: SearchServiceArgs,
    ) -> Result<CallToolResult, McpError> {
        let needle = args.service_name.to_lowercase();
        let groups = self.store.services_rollup().await.map_err(store_err)?;

        let matches: Vec<_> = groups
            .into_iter()
            .filter(|g| {
                g.service
                    .as_deref()
                    .map(|s| s.to_lowercase().contains(&needle))
                    .unwrap_or(false)
                    || g.product
                        .as_deref()
                        .map(|p| p.to_lowercase().contains(&needle))
                        .unwrap_or(false)
            })
            .collect();

        if matches.is_empty() {
            return Ok(text(format!("No service matched '{}'.", args.service_name)));
        }

        let mut out = String::new();
        for group in matches {
            out.push_str(&format!(
                "{} {} {} - hosts: {}\n",
                group.service.as_deref().unwrap_or("unknown"),
                group.product.as_deref().unwrap_or(""),
                group.version.as_deref().unwrap_or(""),
                group.host_ips.join(", ")
            ));
        }
        Ok(text(out))
    }

    #[tool(description = "Render every host and its traceroute hops as a text topology map.")]
    async fn get_network_topology(&self) -> Result<CallToolResult, McpError> {
        let hosts = self.store.unique_hosts().await.map_err(store_err)?;
        if hosts.is_empty() {
            return Ok(text("No hosts recorded yet."));
        }

        let mut out = String::new();
        for host in hosts {
            let hops = self
                .store
                .list_traceroute_for_host(host.id)
                .await
                .map_err(store_err)?;
            out.push_str(&format!("{}\n", host.ip));
            for hop in hops {
                out.push_str(&format!(
                    "  -> hop {}: {} ({}ms)\n",
                    hop.hop_number,
                    hop.ip.as_deref().unwrap_or("*"),
                    hop.rtt_ms.map(|r| r.to_string()).unwrap_or_else(|| "?".into())
                ));
            }
        }
        Ok(text(out))
    }

    #[tool(description = "Flag hosts exposing commonly-insecure or legacy services.")]
    async fn find_vulnerabilities(&self) -> Result<CallToolResult, McpError> {
        const RISKY: &[&str] = &["telnet", "ftp", "rsh", "rlogin", "tftp", "smb", "vnc"];

        let hosts = self.store.unique_hosts().await.map_err(store_err)?;
        let mut out = String::new();
        for host in hosts {
            let ports = self
                .store
                .list_ports_for_host(host.id)
                .await
                .map_err(store_err)?;
            for port in &ports {
                let service = port.service.as_deref().unwrap_or("").to_lowercase();
                if RISKY.iter().any(|r| service.contains(r)) {
                    out.push_str(&format!(
                        "{}:{} exposes {} - consider disabling or firewalling\n",
                        host.ip, port.port, service
                    ));
                }
            }
        }
        if out.is_empty() {
            out.push_str("No commonly-insecure services detected across recorded hosts.");
        }
        Ok(text(out))
    }

    #[tool(description = "Get current status and progress percentage for one scan.")]
    async fn get_scan_progress(
        &self,
        #[tool(aggr)] args: ScanIdArgs,
    ) -> Result<CallToolResult, McpError> {
        let scan = self
            .store
            .get_scan(args.scan_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| McpError::invalid_params("scan not found", None))?;

        Ok(text(format!(
            "Scan {}: status={} progress={}% message={}",
            scan.id,
            scan.status,
            scan.progress_percent,
            scan.progress_message.as_deref().unwrap_or("")
        )))
    }

    #[tool(description = "List every configured scheduled scan.")]
    async fn list_schedules(&self) -> Result<CallToolResult, McpError> {
        let schedules = self.store.list_schedules().await.map_err(store_err)?;
        if schedules.is_empty() {
            return Ok(text("No schedules configured."));
        }
        let mut out = String::new();
        for schedule in schedules {
            out.push_str(&format!(
                "Schedule {}: '{}' cron='{}' networks={} enabled={} next_run={}\n",
                schedule.id,
                schedule.name,
                schedule.cron_expression,
                schedule.network_range,
                schedule.enabled,
                schedule
                    .next_run_at
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "unscheduled".into())
            ));
        }
        Ok(text(out))
    }

    #[tool(description = "Get full detail for one scheduled scan, by id.")]
    async fn get_schedule_details(
        &self,
        #[tool(aggr)] args: ScheduleIdArgs,
    ) -> Result<CallToolResult, McpError> {
        let schedule = self
            .store
            .get_schedule(args.schedule_id)
            .await
            .map_err(store_err)?
            .ok_or_else(|| McpError::invalid_params("schedule not found", None))?;

        Ok(text(format!(
            "Schedule {}: '{}'\ncron: {}\nnetworks: {}\nenabled: {}\nlast_run: {}\nnext_run: {}",
            schedule.id,
            schedule.name,
            schedule.cron_expression,
            schedule.network_range,
            schedule.enabled,
            schedule
                .last_run_at
                .map(|t| t.to_string())
                .unwrap_or_else(|| "never".into()),
            schedule
                .next_run_at
                .map(|t| t.to_string())
                .unwrap_or_else(|| "unscheduled".into()),
        )))
    }

    #[tool(description = "List every user account, role, and active/disabled status.")]
    async fn list_users(&self) -> Result<CallToolResult, McpError> {
        let users = self.store.list_users().await.map_err(store_err)?;
        if users.is_empty() {
            return Ok(text("No users provisioned."));
        }
        let mut out = String::new();
        for user in users {
            out.push_str(&format!(
                "{} [{}] active={} must_change_password={}\n",
                user.username, user.role, user.is_active, user.must_change_password
            ));
        }
        Ok(text(out))
    }

    #[tool(description = "Report service health: version, active scans, scheduler status.")]
    async fn get_system_health(&self) -> Result<CallToolResult, McpError> {
        let active = self.store.list_active_scans().await.map_err(store_err)?;
        Ok(text(format!(
            "service: {}\nversion: {}\nstatus: ok\nactive scans: {}",
            self.config.app_name,
            env!("CARGO_PKG_VERSION"),
            active.len()
        )))
    }

    #[tool(description = "Start a new scan over the given CIDR networks, or auto-detect when omitted.")]
    async fn start_scan(
        &self,
        #[tool(aggr)] args: StartScanArgs,
    ) -> Result<CallToolResult, McpError> {
        let networks = match args.networks.filter(|n| !n.is_empty()) {
            Some(n) => n,
            None => match netwarden_runner::detect_local_network_cidr() {
                Ok(cidr) => vec![cidr],
                Err(_) => {
                    return Ok(text(
                        "Could not auto-detect a local network; pass `networks` explicitly.",
                    ))
                }
            },
        };

        for n in &networks {
            if n.parse::<ipnetwork::IpNetwork>().is_err() {
                return Ok(text(format!("Invalid CIDR network: {n}")));
            }
        }

        let scan = self
            .store
            .create_scan(&netwarden_core::Scan::join_networks(&networks), None)
            .await
            .map_err(store_err)?;

        let store = self.store.clone();
        let output_dir = self.output_dir.clone();
        let scan_id = scan.id;
        let spawn_networks = networks.clone();
        tokio::spawn(async move {
            let orchestrator = netwarden_orchestrator::Orchestrator::new(store, output_dir);
            if let Err(e) = orchestrator.execute_scan(scan_id, &spawn_networks).await {
                tracing::error!(scan_id, error = %e, "mcp-initiated scan failed");
            }
        });

        Ok(text(format!(
            "Scan ID: {}\nNetworks: {}\nStatus: {}\nUse get_scan_details({}) to follow progress.",
            scan.id,
            networks.join(", "),
            scan.status,
            scan.id,
        )))
    }
}

#[tool(tool_box)]
impl ServerHandler for NetwardenMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Read-only query tools over recorded network scans, hosts, services, \
                 schedules, and users, plus a start_scan tool to launch a new scan."
                    .into(),
            ),
            ..Default::default()
        }
    }
}

/// Runs the MCP server over stdio; used by `netwarden-cli`'s `serve --mcp-stdio` mode.
pub async fn serve_stdio(state: AppState) -> anyhow::Result<()> {
    let server = NetwardenMcpServer::from(state);
    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;
    Ok(())
}

/// Runs the MCP server over HTTP/SSE on `bind_addr`, for clients that prefer
/// the SSE transport to spawning a subprocess.
pub async fn serve_sse(state: AppState, bind_addr: SocketAddr) -> anyhow::Result<()> {
    let ct = rmcp::transport::sse_server::SseServer::serve(bind_addr)
        .await?
        .with_service(move || NetwardenMcpServer::from(state.clone()));

    tokio::signal::ctrl_c().await?;
    ct.cancel();
    Ok(())
}
