//! Small helpers shared by the per-entity query modules.

use netwarden_core::{Error, Result};
use std::net::Ipv4Addr;
use std::str::FromStr;

pub(crate) fn parse_ip(raw: &str) -> Result<Ipv4Addr> {
    Ipv4Addr::from_str(raw).map_err(|e| Error::Store(format!("corrupt IP address {raw:?}: {e}")))
}

pub(crate) fn bool_to_int(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(i: i64) -> bool {
    i != 0
}
