//! Exact-match allow-list.

use ahash::AHashSet;
use std::net::IpAddr;

use crate::addr;
use crate::error::{Error, Result};

/// Set of client addresses that bypass range checks.
///
/// Addresses are stored in their 16-byte form (IPv4 as IPv4-mapped IPv6),
/// so `192.168.1.1` and `::ffff:192.168.1.1` are the same entry.
///
/// # Examples
/// ```
/// use rangeguard::Allowlist;
///
/// let allowlist = Allowlist::new(["192.168.1.1", "2001:db8::1"]).unwrap();
/// assert!(allowlist.allowed("::ffff:192.168.1.1".parse().unwrap()));
/// assert!(!allowlist.allowed("192.168.1.2".parse().unwrap()));
///
/// // Ranges are not literals.
/// assert!(Allowlist::new(["10.0.0.0/8"]).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Allowlist {
    addrs: AHashSet<[u8; 16]>,
}

impl Allowlist {
    /// Parse every literal as a single IP address.
    ///
    /// Any literal that does not parse fails the whole list.
    pub fn new<I, S>(literals: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut addrs = AHashSet::new();
        for literal in literals {
            let literal = literal.as_ref().trim();
            let ip: IpAddr = literal
                .parse()
                .map_err(|_| Error::InvalidAllowlistEntry(literal.to_string()))?;
            addrs.insert(addr::to_mapped_octets(ip));
        }
        Ok(Self { addrs })
    }

    /// An allow-list that admits nobody.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether `ip` is allow-listed.
    #[inline]
    pub fn allowed(&self, ip: IpAddr) -> bool {
        !self.addrs.is_empty() && self.addrs.contains(&addr::to_mapped_octets(ip))
    }

    /// Parse a raw client address (see [`addr::parse_client_addr`]) and check
    /// it. Unparseable input is never allowed.
    pub fn allowed_str(&self, raw: &str) -> bool {
        match addr::parse_client_addr(raw) {
            Ok(ip) => self.allowed(ip),
            Err(_) => false,
        }
    }

    /// Number of distinct addresses.
    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_exact_match() {
        let allowlist = Allowlist::new(["192.168.1.1", "2001:db8::1"]).unwrap();

        assert!(allowlist.allowed(ip("192.168.1.1")));
        assert!(allowlist.allowed(ip("2001:db8::1")));
        assert!(!allowlist.allowed(ip("192.168.1.2")));
        assert!(!allowlist.allowed(ip("2001:db8::2")));
    }

    #[test]
    fn test_mapped_and_plain_agree() {
        let allowlist = Allowlist::new(["::ffff:10.5.5.5", "192.168.1.1"]).unwrap();

        assert!(allowlist.allowed(ip("10.5.5.5")));
        assert!(allowlist.allowed(ip("::ffff:10.5.5.5")));
        assert!(allowlist.allowed(ip("::ffff:192.168.1.1")));
        assert_eq!(allowlist.len(), 2);
    }

    #[test]
    fn test_duplicates_collapse() {
        let allowlist = Allowlist::new(["10.0.0.1", "::ffff:10.0.0.1", " 10.0.0.1 "]).unwrap();
        assert_eq!(allowlist.len(), 1);
    }

    #[test]
    fn test_invalid_literal_fails_whole_list() {
        let err = Allowlist::new(["192.168.1.1", "invalid-ip"]).unwrap_err();
        assert!(matches!(err, Error::InvalidAllowlistEntry(ref s) if s == "invalid-ip"));

        assert!(Allowlist::new(["10.0.0.0/8"]).is_err());
        assert!(Allowlist::new(["300.1.1.1"]).is_err());
    }

    #[test]
    fn test_empty() {
        let allowlist = Allowlist::new(Vec::<String>::new()).unwrap();
        assert!(allowlist.is_empty());
        assert!(!allowlist.allowed(ip("127.0.0.1")));
        assert!(Allowlist::empty().is_empty());
    }

    #[test]
    fn test_allowed_str() {
        let allowlist = Allowlist::new(["192.168.1.1", "2001:db8::1"]).unwrap();

        assert!(allowlist.allowed_str("192.168.1.1:54321"));
        assert!(allowlist.allowed_str("[2001:db8::1]:443"));
        assert!(!allowlist.allowed_str("garbage"));
        assert!(!allowlist.allowed_str(""));
    }
}
