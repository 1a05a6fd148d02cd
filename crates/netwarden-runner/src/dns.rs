//! Best-effort reverse-DNS fallback for hosts the scan report left unnamed.

use std::net::Ipv4Addr;
use tracing::debug;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Resolves `ip` to a hostname via PTR lookup. Failures are silent — this is
/// a nicety, not part of the scan's success criteria (spec §4.D.5 step 4).
pub async fn reverse_lookup(ip: Ipv4Addr) -> Option<String> {
    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    match resolver.reverse_lookup(ip.into()).await {
        Ok(response) => response.iter().next().map(|name| {
            let s = name.to_string();
            s.trim_end_matches('.').to_string()
        }),
        Err(e) => {
            debug!(%ip, error = %e, "reverse dns lookup failed");
            None
        }
    }
}
