//! Outbound request guard.
//!
//! Before contacting a URL, every address its host resolves to must be a
//! public unicast address. Loopback, private, link-local, unspecified and
//! unique-local ranges are rejected, including IPv4-mapped IPv6 forms.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, ToSocketAddrs};

use url::{Host, Url};

use crate::error::{WebmentionError, WebmentionResult};

/// Hostname resolution, injectable for tests.
pub trait Resolver: Send + Sync {
    fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl Resolver for SystemResolver {
    fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        Ok((host, port).to_socket_addrs()?.map(|a| a.ip()).collect())
    }
}

/// Reject `url` unless every address behind its host is public.
pub fn check_url(url: &Url, resolver: &dyn Resolver) -> WebmentionResult<()> {
    let reject = |reason: String| WebmentionError::SecurityRejection {
        url: url.to_string(),
        reason,
    };

    let addrs = match url.host() {
        None => return Err(reject("URL has no host".into())),
        Some(Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
        Some(Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            if domain == "localhost" || domain.ends_with(".localhost") {
                return Err(reject(format!("{domain} is a loopback name")));
            }
            let port = url.port_or_known_default().unwrap_or(80);
            resolver
                .resolve(&domain, port)
                .map_err(|e| WebmentionError::Network(format!("resolving {domain}: {e}")))?
        }
    };

    if addrs.is_empty() {
        return Err(WebmentionError::Network(format!("{url} resolved to no addresses")));
    }
    match addrs.into_iter().find(|ip| is_forbidden(*ip)) {
        Some(ip) => Err(reject(format!("{ip} is not a public address"))),
        None => Ok(()),
    }
}

/// Returns `true` for addresses outbound requests must never reach.
pub fn is_forbidden(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => forbidden_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => forbidden_v4(v4),
            None => forbidden_v6(v6),
        },
    }
}

fn forbidden_v4(ip: Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 100.64.0.0/10, carrier-grade NAT
        || (a == 100 && (b & 0xc0) == 64)
        || a == 0
}

fn forbidden_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}
