//! VM/container classification from a parsed host record.
//!
//! Rules run in a fixed order and the first match wins, but a MAC-vendor
//! match always takes precedence over the OS-string and IP-range checks
//! (ported from `detect_enhanced_vm` plus the MAC-vendor pass that used to
//! run earlier in the pipeline).

use ipnetwork::Ipv4Network;
use netwarden_core::ParsedHost;
use std::net::Ipv4Addr;
use std::str::FromStr;

const MAC_VENDOR_MATCHES: &[&str] = &["qemu", "vmware", "virtualbox", "xen", "microsoft", "parallels"];

const OS_INDICATORS: &[(&str, &str)] = &[
    ("docker", "Docker"),
    ("lxc", "LXC"),
    ("container", "Container"),
    ("kvm", "KVM"),
    ("hyperv", "Hyper-V"),
    ("vmware", "VMware"),
    ("virtualbox", "VirtualBox"),
    ("xen", "Xen"),
];

/// Classifies a host as a VM/container (or not) and assigns a label.
/// Never overwrites a vendor-level match already on the host — the runner
/// calls this once, not cumulatively, so `host.is_vm`/`host.vm_type` coming
/// in always reflects the MAC check alone.
pub fn classify(host: &ParsedHost) -> (bool, Option<String>) {
    if host.is_vm {
        return (true, host.vm_type.clone());
    }

    if let Some(vendor) = host.vendor.as_deref() {
        let lower = vendor.to_lowercase();
        for candidate in MAC_VENDOR_MATCHES {
            if lower.contains(candidate) {
                return (true, Some(title_case(candidate)));
            }
        }
    }

    if let Some(os) = host.os.as_deref() {
        let lower = os.to_lowercase();
        for (indicator, vm_type) in OS_INDICATORS {
            if lower.contains(indicator) {
                return (true, Some((*vm_type).to_string()));
            }
        }
    }

    if in_network(host.ip, "172.17.0.0/16") || in_network(host.ip, "172.18.0.0/16") {
        return (true, Some("Docker".to_string()));
    }

    if in_network(host.ip, "10.0.3.0/24") {
        return (true, Some("LXC".to_string()));
    }

    (false, None)
}

fn in_network(ip: Ipv4Addr, cidr: &str) -> bool {
    Ipv4Network::from_str(cidr)
        .map(|net| net.contains(ip))
        .unwrap_or(false)
}

fn title_case(vendor: &str) -> String {
    match vendor {
        "qemu" => "QEMU",
        "vmware" => "VMware",
        "virtualbox" => "VirtualBox",
        "xen" => "Xen",
        "microsoft" => "Microsoft",
        "parallels" => "Parallels",
        other => other,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_with(vendor: Option<&str>, os: Option<&str>, ip: &str) -> ParsedHost {
        ParsedHost {
            ip: Ipv4Addr::from_str(ip).unwrap(),
            vendor: vendor.map(str::to_string),
            os: os.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn mac_vendor_wins_over_os_string() {
        let host = host_with(Some("VMware, Inc."), Some("Linux running KVM"), "192.168.1.5");
        let (is_vm, vm_type) = classify(&host);
        assert!(is_vm);
        assert_eq!(vm_type.as_deref(), Some("VMware"));
    }

    #[test]
    fn os_indicator_detected_when_no_mac_match() {
        let host = host_with(None, Some("Linux 5.4 (docker)"), "192.168.1.5");
        let (is_vm, vm_type) = classify(&host);
        assert!(is_vm);
        assert_eq!(vm_type.as_deref(), Some("Docker"));
    }

    #[test]
    fn docker_bridge_range_detected() {
        let host = host_with(None, None, "172.17.0.4");
        let (is_vm, vm_type) = classify(&host);
        assert!(is_vm);
        assert_eq!(vm_type.as_deref(), Some("Docker"));
    }

    #[test]
    fn lxc_range_detected() {
        let host = host_with(None, None, "10.0.3.12");
        let (is_vm, vm_type) = classify(&host);
        assert!(is_vm);
        assert_eq!(vm_type.as_deref(), Some("LXC"));
    }

    #[test]
    fn physical_host_not_classified() {
        let host = host_with(Some("Dell Inc."), Some("Ubuntu 22.04"), "192.168.1.10");
        let (is_vm, vm_type) = classify(&host);
        assert!(!is_vm);
        assert!(vm_type.is_none());
    }
}
