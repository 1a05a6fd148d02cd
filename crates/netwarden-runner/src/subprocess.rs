//! Supervises the external port-scanning tool (nmap-compatible) as a
//! subprocess: builds its argument lists, enforces the wall-clock timeout on
//! per-host scans, and cleans up partial output on failure.

use netwarden_core::Error;
use netwarden_core::Result;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Hard wall-clock ceiling on a single-host scan, a few seconds past nmap's
/// own `--host-timeout 240s` to give it a chance to exit cleanly first.
const HOST_SCAN_WALL_CLOCK: Duration = Duration::from_secs(300);

pub struct ScanRunner {
    output_dir: PathBuf,
    /// Name or path of the external tool binary; overridable for tests.
    tool: String,
}

impl ScanRunner {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            tool: "nmap".to_string(),
        }
    }

    #[cfg(test)]
    pub fn with_tool(output_dir: impl Into<PathBuf>, tool: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            tool: tool.into(),
        }
    }

    fn discovery_output_path(&self, scan_id: i64) -> PathBuf {
        self.output_dir.join(format!("scan_{scan_id}_discovery.xml"))
    }

    fn host_output_path(&self, scan_id: i64, ip: Ipv4Addr) -> PathBuf {
        self.output_dir
            .join(format!("scan_{scan_id}_{}.xml", ip.to_string().replace('.', "_")))
    }

    /// Fast top-100-port survey of `cidr`. `on_spawn` is invoked with the
    /// child's OS pid as soon as it starts, so the caller can persist it for
    /// the watchdog before the scan finishes.
    pub async fn discover(
        &self,
        cidr: &str,
        scan_id: i64,
        on_spawn: impl FnOnce(u32),
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let xml_output = self.discovery_output_path(scan_id);

        let mut cmd = Command::new(&self.tool);
        cmd.args([
            "-F",
            "--max-retries",
            "1",
            "--host-timeout",
            "30s",
            "-T4",
            "-oX",
        ])
        .arg(&xml_output)
        .arg(cidr)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        run_to_completion(cmd, &xml_output, on_spawn).await?;
        Ok(xml_output)
    }

    /// Comprehensive single-host scan: service/version detection, OS
    /// fingerprinting, forced reverse DNS, traceroute, and NSE banner/cert
    /// scripts, bounded by [`HOST_SCAN_WALL_CLOCK`].
    pub async fn scan_host(
        &self,
        ip: Ipv4Addr,
        scan_id: i64,
        on_spawn: impl FnOnce(u32),
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        let xml_output = self.host_output_path(scan_id, ip);

        let mut cmd = Command::new(&self.tool);
        cmd.args([
            "-sV",
            "-O",
            "-R",
            "--osscan-guess",
            "-T4",
            "--traceroute",
            "--script=banner,ssl-cert,http-title,http-headers",
            "--version-intensity",
            "2",
            "--max-rtt-timeout",
            "200ms",
            "--max-retries",
            "1",
            "--min-rate",
            "100",
            "--max-os-tries",
            "1",
            "--host-timeout",
            "240s",
            "-oX",
        ])
        .arg(&xml_output)
        .arg(ip.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(spawn_error)?;
        if let Some(pid) = child.id() {
            on_spawn(pid);
        }

        let wait = tokio::time::timeout(HOST_SCAN_WALL_CLOCK, child.wait_with_output());
        match wait.await {
            Ok(Ok(output)) => {
                if !output.status.success() {
                    let _ = std::fs::remove_file(&xml_output);
                    return Err(Error::TransientSubprocess(format!(
                        "host scan failed for {ip}: {}",
                        String::from_utf8_lossy(&output.stderr)
                    )));
                }
            }
            Ok(Err(e)) => {
                let _ = std::fs::remove_file(&xml_output);
                return Err(Error::TransientSubprocess(format!(
                    "failed to run host scan for {ip}: {e}"
                )));
            }
            Err(_) => {
                warn!(%ip, scan_id, "host scan exceeded wall-clock timeout, killing");
                let _ = std::fs::remove_file(&xml_output);
                return Err(Error::SubprocessTimeout(HOST_SCAN_WALL_CLOCK));
            }
        }

        if !xml_output.exists() {
            return Err(Error::TransientSubprocess(format!(
                "scanner did not produce an output file for {ip}"
            )));
        }
        Ok(xml_output)
    }
}

async fn run_to_completion(
    mut cmd: Command,
    xml_output: &Path,
    on_spawn: impl FnOnce(u32),
) -> Result<()> {
    let mut child = cmd.spawn().map_err(spawn_error)?;
    if let Some(pid) = child.id() {
        on_spawn(pid);
    }

    let output = child.wait_with_output().await.map_err(|e| {
        Error::TransientSubprocess(format!("failed to run discovery scan: {e}"))
    })?;

    if !output.status.success() {
        return Err(Error::Discovery(format!(
            "discovery scan failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }
    if !xml_output.exists() {
        return Err(Error::Discovery(
            "discovery scan did not produce an output file".to_string(),
        ));
    }

    debug!(?xml_output, "discovery scan produced output");
    Ok(())
}

fn spawn_error(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::NotFound {
        Error::Discovery("scanner binary not found on PATH".to_string())
    } else {
        Error::Discovery(format!("failed to spawn scanner: {e}"))
    }
}
