//! Best-effort guess of the local network(s) to scan when a request omits
//! `networks` entirely.
//!
//! Rather than parsing `ifconfig`/`netstat` output, this asks the OS which
//! local address it would use to reach the internet (the classic
//! connect-a-UDP-socket-and-never-send trick) and assumes a /24 around it.
//! That covers the common single-NIC, single-subnet case the caller actually
//! hits; multi-homed hosts can always pass `networks` explicitly.

use ipnetwork::Ipv4Network;
use netwarden_core::{Error, Result};
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};

/// A well-known public address used only to pick an outbound route; no
/// packet is ever sent to it.
const ROUTE_PROBE_ADDR: &str = "8.8.8.8:80";

/// Detects the local subnet by finding the interface address the kernel
/// would use to route to the public internet, then widening it to a /24.
pub fn detect_local_network() -> Result<Ipv4Network> {
    let local_ip = local_outbound_ipv4()?;
    if local_ip.is_loopback() || is_link_local(local_ip) {
        return Err(Error::Validation(
            "detected local address is loopback or link-local, refusing to guess a network"
                .to_string(),
        ));
    }
    let with_mask = Ipv4Network::new(local_ip, 24)
        .map_err(|e| Error::Validation(format!("failed to derive /24 from {local_ip}: {e}")))?;
    Ok(Ipv4Network::new(with_mask.network(), 24).expect("valid /24 by construction"))
}

/// Convenience wrapper returning the detected network as a CIDR string, the
/// shape the orchestrator and API expect when `networks` is omitted.
pub fn detect_local_network_cidr() -> Result<String> {
    detect_local_network().map(|net| net.to_string())
}

fn local_outbound_ipv4() -> Result<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| Error::Discovery(format!("failed to open probe socket: {e}")))?;
    socket
        .connect(ROUTE_PROBE_ADDR)
        .map_err(|e| Error::Discovery(format!("failed to determine outbound route: {e}")))?;
    match socket
        .local_addr()
        .map_err(|e| Error::Discovery(format!("failed to read local address: {e}")))?
    {
        SocketAddr::V4(addr) => Ok(*addr.ip()),
        SocketAddr::V6(_) => Err(Error::Discovery(
            "outbound route resolved to an IPv6 address, only IPv4 scanning is supported"
                .to_string(),
        )),
    }
}

fn is_link_local(ip: Ipv4Addr) -> bool {
    ip.octets()[0] == 169 && ip.octets()[1] == 254
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_link_local_matches_169_254_range() {
        assert!(is_link_local(Ipv4Addr::new(169, 254, 1, 1)));
        assert!(!is_link_local(Ipv4Addr::new(192, 168, 1, 1)));
    }

    // detect_local_network() touches a real socket and the host's routing
    // table; exercised manually rather than in CI, where outbound UDP may be
    // firewalled entirely.
}
