//! Prefix table: "is this address inside any configured network?"
//!
//! The table is built once from configuration and is read-only afterwards,
//! so lookups take `&self` and need no locking.

mod trie;

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};
use crate::ranges::RangeGroupResolver;
use trie::{mask, BitTrie};

/// `::ffff:0:0/96`, the IPv4-mapped IPv6 block.
const MAPPED_BLOCK: u128 = 0xffff << 32;
const MAPPED_BLOCK_LEN: u8 = 96;

#[inline]
fn v4_key(addr: Ipv4Addr) -> u128 {
    (u32::from(addr) as u128) << 96
}

#[inline]
fn v6_key(addr: Ipv6Addr) -> u128 {
    u128::from(addr)
}

/// Compressed binary trie over IPv4 and IPv6 prefixes.
///
/// IPv4 prefixes are mirrored into the IPv4-mapped IPv6 block and mapped
/// IPv6 prefixes are mirrored back into IPv4, so `10.1.2.3` and
/// `::ffff:10.1.2.3` always get the same answer.
///
/// # Examples
/// ```
/// use rangeguard::PrefixTable;
///
/// let mut table = PrefixTable::new();
/// table.insert_str("10.1.2.3/8").unwrap();
///
/// assert!(table.contains("10.200.0.1".parse().unwrap()));
/// assert!(table.contains("::ffff:10.200.0.1".parse().unwrap()));
/// assert!(!table.contains("11.0.0.1".parse().unwrap()));
/// ```
#[derive(Debug, Clone)]
pub struct PrefixTable {
    v4: BitTrie,
    v6: BitTrie,
}

impl Default for PrefixTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefixTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            v4: BitTrie::new(32),
            v6: BitTrie::new(128),
        }
    }

    /// Build a table from range specs.
    ///
    /// Each spec is either the name of a group known to `resolver`, in which
    /// case every CIDR of the group is inserted, or a CIDR literal. Invalid
    /// CIDRs and unknown group names are logged, recorded in the returned
    /// [`BuildReport`] and skipped.
    pub fn build<S: AsRef<str>>(
        specs: &[S],
        resolver: &dyn RangeGroupResolver,
    ) -> (Self, BuildReport) {
        let mut table = Self::new();
        let mut report = BuildReport::default();

        for spec in specs {
            let spec = spec.as_ref().trim();
            if spec.is_empty() {
                continue;
            }

            if let Some(cidrs) = resolver.resolve(spec) {
                report.groups.push(spec.to_string());
                for cidr in cidrs {
                    match table.insert_str(cidr) {
                        Ok(()) => report.inserted += 1,
                        Err(e) => {
                            log::warn!("Invalid CIDR {} in range group {}: {}", cidr, spec, e);
                            report.skipped.push(SkippedRange {
                                spec: cidr.clone(),
                                group: Some(spec.to_string()),
                            });
                        }
                    }
                }
                continue;
            }

            match table.insert_str(spec) {
                Ok(()) => report.inserted += 1,
                Err(_) if looks_like_group_name(spec) => {
                    log::warn!("Unknown range group {}, no ranges added", spec);
                    report.unknown_groups.push(spec.to_string());
                }
                Err(e) => {
                    log::warn!("Invalid CIDR specification {}: {}", spec, e);
                    report.skipped.push(SkippedRange {
                        spec: spec.to_string(),
                        group: None,
                    });
                }
            }
        }

        log::debug!(
            "Built prefix table: {} ranges ({} IPv4, {} IPv6 prefixes stored)",
            report.inserted,
            table.v4_count(),
            table.v6_count()
        );

        (table, report)
    }

    /// Parse and insert a CIDR such as `192.168.0.0/16` or `2001:db8::/32`.
    ///
    /// Host bits are masked off, so `10.1.2.3/8` is stored as `10.0.0.0/8`.
    pub fn insert_str(&mut self, cidr: &str) -> Result<()> {
        let cidr = cidr.trim();
        let net: IpNet = cidr
            .parse()
            .map_err(|_| Error::InvalidCidr(cidr.to_string()))?;
        self.insert(net);
        Ok(())
    }

    /// Insert a network, together with its IPv4/IPv6 mirror.
    pub fn insert(&mut self, net: IpNet) {
        match net {
            IpNet::V4(n) => self.insert_v4(n),
            IpNet::V6(n) => self.insert_v6(n),
        }
    }

    fn insert_v4(&mut self, net: Ipv4Net) {
        let len = net.prefix_len();
        let key = v4_key(net.network());
        self.v4.insert(key, len);
        self.v6
            .insert(MAPPED_BLOCK | (key >> 96), len + MAPPED_BLOCK_LEN);
    }

    fn insert_v6(&mut self, net: Ipv6Net) {
        let len = net.prefix_len();
        let key = v6_key(net.network());
        self.v6.insert(key, len);

        if len >= MAPPED_BLOCK_LEN {
            if mask(key, MAPPED_BLOCK_LEN) == MAPPED_BLOCK {
                let v4 = (key as u32 as u128) << 96;
                self.v4.insert(v4, len - MAPPED_BLOCK_LEN);
            }
        } else if mask(MAPPED_BLOCK, len) == key {
            // Covers the whole mapped block, hence all of IPv4.
            self.v4.insert(0, 0);
        }
    }

    /// Whether any inserted prefix covers `addr`.
    #[inline]
    pub fn contains(&self, addr: IpAddr) -> bool {
        match addr {
            IpAddr::V4(v4) => self.v4.contains(v4_key(v4)),
            IpAddr::V6(v6) => self.v6.contains(v6_key(v6)),
        }
    }

    /// Number of stored IPv4 prefixes, mirrors included.
    pub fn v4_count(&self) -> usize {
        self.v4.len()
    }

    /// Number of stored IPv6 prefixes, mirrors included.
    pub fn v6_count(&self) -> usize {
        self.v6.len()
    }

    /// Total number of stored prefixes.
    ///
    /// Prefixes already covered by a shorter one are not stored.
    pub fn len(&self) -> usize {
        self.v4_count() + self.v6_count()
    }

    /// Whether nothing was inserted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of trie nodes across both address families.
    pub fn node_count(&self) -> usize {
        self.v4.node_count() + self.v6.node_count()
    }
}

/// A spec that has no `/` and is not an address is taken to be a group name.
fn looks_like_group_name(spec: &str) -> bool {
    !spec.contains('/') && spec.parse::<IpAddr>().is_err()
}

/// A range that was skipped while building a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRange {
    /// The offending CIDR text.
    pub spec: String,
    /// The group it came from, if any.
    pub group: Option<String>,
}

/// Summary of a [`PrefixTable::build`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Ranges parsed and inserted (before mirroring).
    pub inserted: usize,
    /// Group names that were expanded.
    pub groups: Vec<String>,
    /// Entries that were not valid CIDRs.
    pub skipped: Vec<SkippedRange>,
    /// Names that were neither a known group nor a CIDR.
    pub unknown_groups: Vec<String>,
}

impl BuildReport {
    /// Whether every spec was used.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.unknown_groups.is_empty()
    }
}
