//! Typed deserialization of the external scanner's XML report format.
//!
//! Uses `quick-xml`'s serde integration the way a hand-rolled tree walk
//! would: one struct per element, `@attr` fields for XML attributes, `Vec`
//! fields with `#[serde(default)]` for repeated children that may be absent.

use serde::Deserialize;

/// Root element: `<nmaprun>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename = "nmaprun")]
pub struct Run {
    #[serde(rename = "host", default)]
    pub hosts: Vec<XmlHost>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XmlHost {
    pub status: Option<Status>,
    #[serde(rename = "address", default)]
    pub addresses: Vec<Address>,
    pub hostnames: Option<Hostnames>,
    pub ports: Option<Ports>,
    pub os: Option<Os>,
    pub uptime: Option<Uptime>,
    pub distance: Option<Distance>,
    pub trace: Option<Trace>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Status {
    #[serde(rename = "@state")]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Address {
    #[serde(rename = "@addr")]
    pub addr: String,
    #[serde(rename = "@addrtype")]
    pub addr_type: String,
    #[serde(rename = "@vendor")]
    pub vendor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hostnames {
    #[serde(rename = "hostname", default)]
    pub hostnames: Vec<Hostname>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hostname {
    #[serde(rename = "@name")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ports {
    #[serde(rename = "port", default)]
    pub ports: Vec<XmlPort>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct XmlPort {
    #[serde(rename = "@protocol")]
    pub protocol: String,
    #[serde(rename = "@portid")]
    pub port_id: u16,
    pub state: PortState,
    pub service: Option<Service>,
    #[serde(rename = "script", default)]
    pub scripts: Vec<Script>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortState {
    #[serde(rename = "@state")]
    pub state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    #[serde(rename = "@name")]
    pub name: Option<String>,
    #[serde(rename = "@product")]
    pub product: Option<String>,
    #[serde(rename = "@version")]
    pub version: Option<String>,
    #[serde(rename = "@extrainfo")]
    pub extrainfo: Option<String>,
    pub cpe: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@output")]
    pub output: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Os {
    #[serde(rename = "osmatch", default)]
    pub matches: Vec<OsMatch>,
    pub osclass: Option<OsClass>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsMatch {
    #[serde(rename = "@name")]
    pub name: String,
    #[serde(rename = "@accuracy")]
    pub accuracy: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsClass {
    pub cpe: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Uptime {
    #[serde(rename = "@seconds")]
    pub seconds: Option<i64>,
    #[serde(rename = "@lastboot")]
    pub lastboot: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Distance {
    #[serde(rename = "@value")]
    pub value: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trace {
    #[serde(rename = "hop", default)]
    pub hops: Vec<Hop>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Hop {
    #[serde(rename = "@ttl")]
    pub ttl: i32,
    #[serde(rename = "@ipaddr")]
    pub ipaddr: Option<String>,
    #[serde(rename = "@host")]
    pub host: Option<String>,
    #[serde(rename = "@rtt")]
    pub rtt: Option<f64>,
}

impl XmlHost {
    pub fn is_up(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.state == "up")
    }

    pub fn ipv4(&self) -> Option<&str> {
        self.addresses
            .iter()
            .find(|a| a.addr_type == "ipv4")
            .map(|a| a.addr.as_str())
    }

    pub fn mac(&self) -> Option<(&str, Option<&str>)> {
        self.addresses
            .iter()
            .find(|a| a.addr_type == "mac")
            .map(|a| (a.addr.as_str(), a.vendor.as_deref()))
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostnames
            .as_ref()
            .and_then(|hn| hn.hostnames.first())
            .map(|h| h.name.as_str())
            .filter(|n| !n.is_empty())
    }

    pub fn has_open_port(&self) -> bool {
        self.ports
            .as_ref()
            .is_some_and(|p| p.ports.iter().any(|port| port.state.state == "open"))
    }
}
