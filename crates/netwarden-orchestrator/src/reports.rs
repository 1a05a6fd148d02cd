//! Renders the HTML/spreadsheet/graph artifacts for a finished scan.
//!
//! Each function is a pure translation from parsed host records to a file on
//! disk. A missing external renderer (the `dot` binary, in `graph`) yields
//! `Ok(None)`, not an error — absent artifacts are recorded as absent.

use netwarden_core::{ParsedHost, Result};
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tracing::warn;

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Scan {{ scan_id }} report</title></head>
<body>
<h1>Network scan #{{ scan_id }}</h1>
<p>{{ hosts | length }} host(s) discovered.</p>
<table border="1" cellpadding="4">
<tr><th>IP</th><th>Hostname</th><th>OS</th><th>VM</th><th>Open ports</th></tr>
{% for host in hosts %}
<tr>
<td>{{ host.ip }}</td>
<td>{{ host.hostname | default(value="") }}</td>
<td>{{ host.os | default(value="") }}</td>
<td>{{ host.is_vm }}</td>
<td>
{% for port in host.ports %}{{ port.port }}/{{ port.protocol }} ({{ port.service | default(value="?") }}){% if not loop.last %}, {% endif %}{% endfor %}
</td>
</tr>
{% endfor %}
</table>
</body>
</html>
"#;

/// Renders the HTML summary report for a scan.
pub fn generate_html(scan_id: i64, hosts: &[ParsedHost], out_path: &Path) -> Result<PathBuf> {
    let mut tera = Tera::default();
    tera.add_raw_template("report.html", HTML_TEMPLATE)
        .map_err(|e| netwarden_core::Error::Store(format!("template error: {e}")))?;

    let mut ctx = Context::new();
    ctx.insert("scan_id", &scan_id);
    ctx.insert("hosts", &hosts.iter().map(HostView::from).collect::<Vec<_>>());

    let rendered = tera
        .render("report.html", &ctx)
        .map_err(|e| netwarden_core::Error::Store(format!("template render error: {e}")))?;
    std::fs::write(out_path, rendered)?;
    Ok(out_path.to_path_buf())
}

#[derive(serde::Serialize)]
struct HostView {
    ip: String,
    hostname: Option<String>,
    os: Option<String>,
    is_vm: bool,
    ports: Vec<PortView>,
}

#[derive(serde::Serialize)]
struct PortView {
    port: u16,
    protocol: String,
    service: Option<String>,
}

impl From<&ParsedHost> for HostView {
    fn from(h: &ParsedHost) -> Self {
        HostView {
            ip: h.ip.to_string(),
            hostname: h.hostname.clone(),
            os: h.os.clone(),
            is_vm: h.is_vm,
            ports: h
                .ports
                .iter()
                .map(|p| PortView {
                    port: p.port,
                    protocol: p.protocol.to_string(),
                    service: p.service.clone(),
                })
                .collect(),
        }
    }
}

/// Writes the per-host/per-port spreadsheet report.
pub fn generate_xlsx(hosts: &[ParsedHost], out_path: &Path) -> Result<PathBuf> {
    use rust_xlsxwriter::Workbook;

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet().set_name("Hosts").map_err(xlsx_err)?;

    let headers = ["IP", "Hostname", "OS", "VM", "Port", "Protocol", "Service", "Product", "Version"];
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).map_err(xlsx_err)?;
    }

    let mut row = 1u32;
    for host in hosts {
        if host.ports.is_empty() {
            write_host_row(sheet, row, host, None)?;
            row += 1;
            continue;
        }
        for port in &host.ports {
            write_host_row(sheet, row, host, Some(port))?;
            row += 1;
        }
    }

    workbook.save(out_path).map_err(xlsx_err)?;
    Ok(out_path.to_path_buf())
}

fn write_host_row(
    sheet: &mut rust_xlsxwriter::Worksheet,
    row: u32,
    host: &ParsedHost,
    port: Option<&netwarden_core::ParsedPort>,
) -> Result<()> {
    sheet.write_string(row, 0, host.ip.to_string()).map_err(xlsx_err)?;
    sheet
        .write_string(row, 1, host.hostname.as_deref().unwrap_or(""))
        .map_err(xlsx_err)?;
    sheet
        .write_string(row, 2, host.os.as_deref().unwrap_or(""))
        .map_err(xlsx_err)?;
    sheet.write_boolean(row, 3, host.is_vm).map_err(xlsx_err)?;
    if let Some(port) = port {
        sheet.write_number(row, 4, port.port as f64).map_err(xlsx_err)?;
        sheet
            .write_string(row, 5, port.protocol.to_string())
            .map_err(xlsx_err)?;
        sheet
            .write_string(row, 6, port.service.as_deref().unwrap_or(""))
            .map_err(xlsx_err)?;
        sheet
            .write_string(row, 7, port.product.as_deref().unwrap_or(""))
            .map_err(xlsx_err)?;
        sheet
            .write_string(row, 8, port.version.as_deref().unwrap_or(""))
            .map_err(xlsx_err)?;
    }
    Ok(())
}

fn xlsx_err(e: rust_xlsxwriter::XlsxError) -> netwarden_core::Error {
    netwarden_core::Error::Store(format!("xlsx write error: {e}"))
}

/// Outputs produced by [`generate_graph`]: a DOT source file is always
/// written; the rendered raster/vector files are `None` when the `dot`
/// binary isn't on `PATH`.
pub struct GraphOutputs {
    pub dot: PathBuf,
    pub png: Option<PathBuf>,
    pub svg: Option<PathBuf>,
}

/// Builds a star topology graph (one hub node, one spoke per host, labeled
/// with open ports) and attempts to render it with Graphviz's `dot`.
pub fn generate_graph(hosts: &[ParsedHost], output_base: &Path) -> Result<GraphOutputs> {
    let dot_source = build_dot_source(hosts);
    let dot_path = output_base.with_extension("dot");
    std::fs::write(&dot_path, &dot_source)?;

    let png_path = output_base.with_extension("png");
    let svg_path = output_base.with_extension("svg");

    let png = render_with_dot(&dot_path, &png_path, "png");
    let svg = render_with_dot(&dot_path, &svg_path, "svg");

    Ok(GraphOutputs {
        dot: dot_path,
        png,
        svg,
    })
}

fn build_dot_source(hosts: &[ParsedHost]) -> String {
    let mut out = String::from("digraph network {\n  rankdir=LR;\n  \"network\" [shape=cloud];\n");
    for host in hosts {
        let label = match &host.hostname {
            Some(name) => format!("{}\\n{}", host.ip, name),
            None => host.ip.to_string(),
        };
        let ports = host
            .ports
            .iter()
            .map(|p| p.port.to_string())
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&format!(
            "  \"{}\" [label=\"{}\\n{}\", shape=box];\n",
            host.ip, label, ports
        ));
        out.push_str(&format!("  \"network\" -> \"{}\";\n", host.ip));
    }
    out.push_str("}\n");
    out
}

fn render_with_dot(dot_path: &Path, out_path: &Path, format: &str) -> Option<PathBuf> {
    let status = std::process::Command::new("dot")
        .args(["-T", format])
        .arg(dot_path)
        .arg("-o")
        .arg(out_path)
        .status();

    match status {
        Ok(s) if s.success() => Some(out_path.to_path_buf()),
        Ok(s) => {
            warn!(?s, "dot renderer exited non-zero, treating graph output as absent");
            None
        }
        Err(e) => {
            warn!(error = %e, "dot renderer not available, treating graph output as absent");
            None
        }
    }
}
