//! Pure translation from the scanner's XML report to [`ParsedHost`] records.

use crate::xml::{self, XmlHost};
use netwarden_core::{Error, ParsedHop, ParsedHost, ParsedPort, Protocol, Result, ScriptOutputs};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Parses a raw XML report into one [`ParsedHost`] per `<host status="up">`
/// element. Down hosts are dropped; everything else about a host — ports,
/// OS guess, traceroute — is carried through uninterpreted.
pub fn parse_report(xml: &[u8]) -> Result<Vec<ParsedHost>> {
    let run: xml::Run =
        quick_xml::de::from_reader(xml).map_err(|e| Error::Parse(format!("invalid scan report: {e}")))?;

    run.hosts
        .iter()
        .filter(|h| h.is_up())
        .map(parse_host)
        .collect()
}

fn parse_host(host: &XmlHost) -> Result<ParsedHost> {
    let ip = host
        .ipv4()
        .ok_or_else(|| Error::Parse("host element missing an ipv4 address".to_string()))?;
    let ip = Ipv4Addr::from_str(ip).map_err(|e| Error::Parse(format!("malformed ipv4 address: {e}")))?;

    let (mac, vendor) = match host.mac() {
        Some((mac, vendor)) => (Some(mac.to_string()), vendor.map(str::to_string)),
        None => (None, None),
    };

    let (os, os_accuracy, cpe) = match host.os.as_ref() {
        Some(os) => {
            let best = os.matches.first();
            let name = best.map(|m| m.name.clone());
            let accuracy = best
                .and_then(|m| m.accuracy.as_ref())
                .and_then(|a| a.parse().ok());
            let cpe = os.osclass.as_ref().and_then(|c| c.cpe.clone());
            (name, accuracy, cpe)
        }
        None => (None, None, None),
    };

    let (uptime_seconds, last_boot) = match host.uptime.as_ref() {
        Some(u) => (u.seconds, u.lastboot.clone()),
        None => (None, None),
    };

    let distance = host.distance.as_ref().map(|d| d.value);

    let traceroute = host
        .trace
        .as_ref()
        .map(|t| {
            t.hops
                .iter()
                .map(|h| ParsedHop {
                    ttl: h.ttl,
                    ip: h.ipaddr.clone(),
                    hostname: h.host.clone(),
                    rtt_ms: h.rtt,
                })
                .collect()
        })
        .unwrap_or_default();

    let ports = host
        .ports
        .as_ref()
        .map(|p| {
            p.ports
                .iter()
                .filter(|port| port.state.state == "open")
                .map(parse_port)
                .collect::<Result<Vec<_>>>()
        })
        .transpose()?
        .unwrap_or_default();

    Ok(ParsedHost {
        ip,
        hostname: host.hostname().map(str::to_string),
        mac,
        vendor,
        os,
        os_accuracy,
        is_vm: false,
        vm_type: None,
        uptime_seconds,
        last_boot,
        distance,
        cpe,
        ports,
        traceroute,
    })
}

fn parse_port(port: &xml::XmlPort) -> Result<ParsedPort> {
    let protocol = Protocol::from_str(&port.protocol)
        .map_err(|_| Error::Parse(format!("unknown protocol {:?}", port.protocol)))?;

    let mut script_output = ScriptOutputs::new();
    for script in &port.scripts {
        if !script.output.is_empty() {
            script_output.insert(script.id.clone(), script.output.clone());
        }
    }

    Ok(ParsedPort {
        port: port.port_id,
        protocol,
        service: port.service.as_ref().and_then(|s| s.name.clone()),
        product: port.service.as_ref().and_then(|s| s.product.clone()),
        version: port.service.as_ref().and_then(|s| s.version.clone()),
        extrainfo: port.service.as_ref().and_then(|s| s.extrainfo.clone()),
        cpe: port.service.as_ref().and_then(|s| s.cpe.clone()),
        script_output,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nmaprun>
  <host>
    <status state="up"/>
    <address addr="10.0.1.1" addrtype="ipv4"/>
    <address addr="AA:BB:CC:DD:EE:01" addrtype="mac" vendor="VMware, Inc."/>
    <hostnames><hostname name="gateway.local"/></hostnames>
    <ports>
      <port protocol="tcp" portid="22">
        <state state="open"/>
        <service name="ssh" product="OpenSSH" version="9.6"/>
        <script id="banner" output="SSH-2.0-OpenSSH_9.6"/>
      </port>
      <port protocol="tcp" portid="3306">
        <state state="filtered"/>
      </port>
    </ports>
    <os>
      <osmatch name="Linux 5.15" accuracy="95"/>
      <osclass><cpe>cpe:/o:linux:linux_kernel:5</cpe></osclass>
    </os>
    <uptime seconds="12345" lastboot="Mon Jan  1 00:00:00 2026"/>
    <distance value="1"/>
    <trace>
      <hop ttl="1" ipaddr="10.0.1.254" rtt="0.5"/>
    </trace>
  </host>
  <host>
    <status state="down"/>
    <address addr="10.0.1.99" addrtype="ipv4"/>
  </host>
</nmaprun>"#;

    #[test]
    fn down_hosts_are_dropped() {
        let hosts = parse_report(REPORT.as_bytes()).unwrap();
        assert_eq!(hosts.len(), 1);
    }

    #[test]
    fn filtered_ports_are_excluded() {
        let hosts = parse_report(REPORT.as_bytes()).unwrap();
        assert_eq!(hosts[0].ports.len(), 1);
        assert_eq!(hosts[0].ports[0].port, 22);
    }

    #[test]
    fn script_output_and_os_fields_survive() {
        let hosts = parse_report(REPORT.as_bytes()).unwrap();
        let host = &hosts[0];
        assert_eq!(host.os.as_deref(), Some("Linux 5.15"));
        assert_eq!(host.os_accuracy, Some(95));
        assert_eq!(host.cpe.as_deref(), Some("cpe:/o:linux:linux_kernel:5"));
        assert_eq!(host.uptime_seconds, Some(12345));
        assert_eq!(host.traceroute.len(), 1);
        assert_eq!(
            host.ports[0].script_output.get("banner").map(String::as_str),
            Some("SSH-2.0-OpenSSH_9.6")
        );
    }

    #[test]
    fn has_meaningful_data_reflects_phase_4_filter() {
        let hosts = parse_report(REPORT.as_bytes()).unwrap();
        assert!(hosts[0].has_meaningful_data());

        let empty = ParsedHost {
            ip: Ipv4Addr::new(10, 0, 0, 1),
            hostname: Some("ghost.local".to_string()),
            ..Default::default()
        };
        assert!(!empty.has_meaningful_data());
    }
}
