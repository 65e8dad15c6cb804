//! Client address normalization.
//!
//! Every address that reaches the checker passes through here so that the
//! allow-list, the cache and the prefix table agree on what "the same
//! address" means. IPv4 addresses and their IPv4-mapped IPv6 spellings
//! (`::ffff:a.b.c.d`) are treated as one address.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};

/// Parse a client address as it typically arrives from a connection or a
/// proxy header.
///
/// Accepts bare addresses (`192.0.2.1`, `2001:db8::1`), `host:port` for
/// IPv4, bracketed IPv6 with or without a port (`[2001:db8::1]:443`), and
/// strips IPv6 zone identifiers (`fe80::1%eth0`).
pub fn parse_client_addr(raw: &str) -> Result<IpAddr> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidAddress("empty address".to_string()));
    }

    if let Ok(ip) = raw.parse::<IpAddr>() {
        return Ok(ip);
    }

    let host = split_host(raw).ok_or_else(|| Error::InvalidAddress(raw.to_string()))?;
    let host = match host.split_once('%') {
        Some((addr, _zone)) => addr,
        None => host,
    };

    host.parse::<IpAddr>()
        .map_err(|_| Error::InvalidAddress(raw.to_string()))
}

/// Strip a port and IPv6 brackets from a `host:port` string.
///
/// Returns `None` when a bracketed host is followed by anything other than
/// nothing or `:<port>`.
fn split_host(raw: &str) -> Option<&str> {
    if let Some(rest) = raw.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        if tail.is_empty() {
            return Some(host);
        }
        return tail
            .strip_prefix(':')
            .filter(|port| port.parse::<u16>().is_ok())
            .map(|_| host);
    }

    // A single colon means IPv4 with a port; more than one is bare IPv6.
    if let Some((host, port)) = raw.rsplit_once(':') {
        if !host.contains(':') && port.parse::<u16>().is_ok() {
            return Some(host);
        }
    }

    Some(raw)
}

/// Build an address from its raw network-order octets.
///
/// Only 4-byte (IPv4) and 16-byte (IPv6) slices are valid.
pub fn from_octets(bytes: &[u8]) -> Result<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = [bytes[0], bytes[1], bytes[2], bytes[3]];
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let mut octets = [0u8; 16];
            octets.copy_from_slice(bytes);
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        n => Err(Error::InvalidAddress(format!(
            "expected 4 or 16 address bytes, got {}",
            n
        ))),
    }
}

/// Collapse IPv4-mapped IPv6 addresses to plain IPv4.
pub fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

/// The 16-byte form of an address, IPv4 expressed as IPv4-mapped IPv6.
pub fn to_mapped_octets(ip: IpAddr) -> [u8; 16] {
    match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}

/// Cache key for an address: the text form of its canonical address.
pub fn cache_key(ip: IpAddr) -> String {
    canonical(ip).to_string()
}
