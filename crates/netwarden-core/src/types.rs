//! Domain types shared by the store, runner, orchestrator, and API crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Lifecycle state of a `Scan`.
///
/// Transitions obey `pending -> running -> {completed, failed, cancelled}`;
/// no terminal state ever transitions back to a non-terminal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ScanStatus {
    /// Terminal states are the ones that set `completed_at` and never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Cancelled
        )
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
            ScanStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for ScanStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "pending" => ScanStatus::Pending,
            "running" => ScanStatus::Running,
            "completed" => ScanStatus::Completed,
            "failed" => ScanStatus::Failed,
            "cancelled" => ScanStatus::Cancelled,
            other => return Err(Error::Validation(format!("unknown scan status: {other}"))),
        })
    }
}

/// Lifecycle state of a single `Host` within a running scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum HostScanStatus {
    Pending,
    Scanning,
    Completed,
    Failed,
}

impl fmt::Display for HostScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HostScanStatus::Pending => "pending",
            HostScanStatus::Scanning => "scanning",
            HostScanStatus::Completed => "completed",
            HostScanStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for HostScanStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "pending" => HostScanStatus::Pending,
            "scanning" => HostScanStatus::Scanning,
            "completed" => HostScanStatus::Completed,
            "failed" => HostScanStatus::Failed,
            other => {
                return Err(Error::Validation(format!(
                    "unknown host scan status: {other}"
                )))
            }
        })
    }
}

/// Transport protocol of a discovered `Port`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        })
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            other => return Err(Error::Validation(format!("unknown protocol: {other}"))),
        })
    }
}

/// File format of a generated `Artifact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ArtifactType {
    Html,
    Png,
    Svg,
    Xlsx,
    Dot,
    Xml,
}

impl fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArtifactType::Html => "html",
            ArtifactType::Png => "png",
            ArtifactType::Svg => "svg",
            ArtifactType::Xlsx => "xlsx",
            ArtifactType::Dot => "dot",
            ArtifactType::Xml => "xml",
        })
    }
}

impl FromStr for ArtifactType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "html" => ArtifactType::Html,
            "png" => ArtifactType::Png,
            "svg" => ArtifactType::Svg,
            "xlsx" => ArtifactType::Xlsx,
            "dot" => ArtifactType::Dot,
            "xml" => ArtifactType::Xml,
            other => return Err(Error::Validation(format!("unknown artifact type: {other}"))),
        })
    }
}

/// Role attached to a `User` for the API's admin/viewer access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Viewer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Admin => "admin",
            Role::Viewer => "viewer",
        })
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "admin" => Role::Admin,
            "viewer" => Role::Viewer,
            other => return Err(Error::Validation(format!("unknown role: {other}"))),
        })
    }
}

/// A scan execution: one or more networks scanned together, tracked from
/// submission through a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: i64,
    pub network_range: String,
    pub status: ScanStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub progress_percent: i32,
    pub progress_message: Option<String>,
    pub error_message: Option<String>,
    pub schedule_id: Option<i64>,
    /// OS pid of the discovery-phase scanner process, while one is running.
    pub external_pid: Option<i64>,
}

impl Scan {
    /// Splits the stored comma-joined `network_range` back into individual CIDRs.
    pub fn networks(&self) -> Vec<String> {
        self.network_range
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn join_networks(networks: &[String]) -> String {
        networks.join(",")
    }
}

/// A single discovered device within a `Scan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Host {
    pub id: i64,
    pub scan_id: i64,
    pub ip: Ipv4Addr,
    pub hostname: Option<String>,
    pub mac: Option<String>,
    pub vendor: Option<String>,
    pub os: Option<String>,
    pub os_accuracy: Option<i32>,
    pub is_vm: bool,
    pub vm_type: Option<String>,
    pub uptime_seconds: Option<i64>,
    pub last_boot: Option<String>,
    pub distance: Option<i32>,
    pub cpe: Option<String>,
    pub scan_status: HostScanStatus,
    pub scan_started_at: Option<DateTime<Utc>>,
    pub scan_completed_at: Option<DateTime<Utc>>,
    pub scan_progress_percent: i32,
    pub scan_error_message: Option<String>,
    pub ports_discovered: i32,
    /// OS pid of the external scanner process currently (or most recently)
    /// enumerating this host. The watchdog targets this directly and only
    /// falls back to command-line matching when it is unset or recycled.
    pub external_pid: Option<i64>,
}

/// A single open port/service observed on a `Host`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub id: i64,
    pub host_id: i64,
    pub port: u16,
    pub protocol: Protocol,
    pub service: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
    pub extrainfo: Option<String>,
    pub cpe: Option<String>,
    /// Opaque `{script_name: output}` map, stored as a JSON blob.
    pub script_output: Option<serde_json::Value>,
}

/// A single `(ttl, ip, rtt)` traceroute observation towards a `Host`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracerouteHop {
    pub id: i64,
    pub host_id: i64,
    pub hop_number: i32,
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub rtt_ms: Option<f64>,
}

/// A derived output file (report or graph) belonging to a `Scan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: i64,
    pub scan_id: i64,
    pub artifact_type: ArtifactType,
    pub file_path: String,
    pub file_size: Option<i64>,
}

/// A durable cron-triggered scan definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: i64,
    pub name: String,
    pub cron_expression: String,
    pub network_range: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub created_by: Option<i64>,
}

impl Schedule {
    pub fn networks(&self) -> Vec<String> {
        self.network_range
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// A Netwarden account. Owned entirely by the auth module; the orchestration
/// engine never reads or writes this table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub role: Role,
    pub must_change_password: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A live-tunable persisted in the `settings` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

/// Well-known setting keys, so callers don't sprinkle string literals.
pub mod setting_keys {
    pub const SCAN_PARALLELISM: &str = "scan_parallelism";
    pub const DATA_RETENTION_DAYS: &str = "data_retention_days";
    pub const SCHEMA_VERSION: &str = "schema_version";
}

/// Default / bound values for the live-tunable settings.
pub const DEFAULT_SCAN_PARALLELISM: i64 = 8;
pub const MIN_SCAN_PARALLELISM: i64 = 1;
pub const MAX_SCAN_PARALLELISM: i64 = 32;

pub const DEFAULT_DATA_RETENTION_DAYS: i64 = 90;
pub const MIN_DATA_RETENTION_DAYS: i64 = 1;
pub const MAX_DATA_RETENTION_DAYS: i64 = 365;

/// One parsed `<script>` result attached to a port, kept as an opaque
/// name -> text-output pair until it is serialized into `Port.script_output`.
pub type ScriptOutputs = BTreeMap<String, String>;

/// A single host record as produced by [`netwarden_runner::parse`], before it
/// has been persisted. Carries everything the XML report had to say about one
/// IP; the orchestrator turns this into `Host`/`Port`/`TracerouteHop` rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedHost {
    pub ip: Ipv4Addr,
    pub hostname: Option<String>,
    pub mac: Option<String>,
    pub vendor: Option<String>,
    pub os: Option<String>,
    pub os_accuracy: Option<i32>,
    pub is_vm: bool,
    pub vm_type: Option<String>,
    pub uptime_seconds: Option<i64>,
    pub last_boot: Option<String>,
    pub distance: Option<i32>,
    pub cpe: Option<String>,
    pub ports: Vec<ParsedPort>,
    pub traceroute: Vec<ParsedHop>,
}

impl ParsedHost {
    /// A bare record carrying only the IP, for persisting a best-effort
    /// "completed" host after its subprocess succeeded but the report could
    /// not be read or parsed.
    pub fn empty(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            ..Default::default()
        }
    }

    /// A host "has data" when it carries at least one open port, an OS
    /// fingerprint, or a MAC address. A hostname alone is not enough — DNS
    /// ghosts are not devices (phase 4 filtering, spec §4.D.7).
    pub fn has_meaningful_data(&self) -> bool {
        !self.ports.is_empty() || self.os.is_some() || self.mac.is_some()
    }
}

/// A single parsed `<port>` element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedPort {
    pub port: u16,
    pub protocol: Protocol,
    pub service: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
    pub extrainfo: Option<String>,
    pub cpe: Option<String>,
    pub script_output: ScriptOutputs,
}

/// A single parsed `<hop>` element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedHop {
    pub ttl: i32,
    pub ip: Option<String>,
    pub hostname: Option<String>,
    pub rtt_ms: Option<f64>,
}
