//! The request-gating facade.

mod config;

pub use config::{CheckerConfig, DefaultRanges};

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use crate::addr;
use crate::allowlist::Allowlist;
use crate::cache::{CacheConfig, CacheStats, Clock, MembershipCache, SystemClock};
use crate::context::Context;
use crate::error::Result;
use crate::ranges::{builtin, RangeGroupResolver};
use crate::table::{BuildReport, PrefixTable};

/// Outcome of classifying a client address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// On the allow-list; ranges were not consulted.
    Allowlisted,
    /// Inside a configured range.
    InRange,
    /// Outside every configured range.
    NotInRange,
}

impl Verdict {
    /// Whether the request should proceed.
    pub fn is_allowed(&self) -> bool {
        !matches!(self, Verdict::InRange)
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allowlisted => "allowlisted",
            Verdict::InRange => "in_range",
            Verdict::NotInRange => "not_in_range",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decides whether a client address may proceed.
///
/// An `IpChecker` owns its prefix table, allow-list and cache; it is built
/// once per configuration and shared (e.g. behind an `Arc`) by every
/// request handler. Independent checkers never share state.
///
/// Malformed client addresses are rejected: `req_allowed` returns `false`
/// for them. Callers that want to handle malformed input differently should
/// use [`classify`](Self::classify).
///
/// # Examples
/// ```
/// use rangeguard::{Context, IpChecker};
///
/// let checker = IpChecker::new(&["10.0.0.0/8"], &["10.5.5.5"]).unwrap();
/// let ctx = Context::background();
///
/// assert!(!checker.req_allowed(&ctx, "10.1.2.3"));
/// assert!(checker.req_allowed(&ctx, "10.5.5.5"));
/// assert!(checker.req_allowed(&ctx, "192.0.2.1"));
/// assert!(!checker.req_allowed(&ctx, "not-an-ip"));
/// ```
pub struct IpChecker {
    table: PrefixTable,
    allowlist: Allowlist,
    cache: MembershipCache,
    report: BuildReport,
}

impl IpChecker {
    /// Build a checker using the built-in range groups and the default
    /// cache configuration.
    ///
    /// Fails only if an allow-list literal is not an IP address; bad range
    /// specs are logged and skipped.
    pub fn new<R, A>(range_specs: &[R], allowlist: &[A]) -> Result<Self>
    where
        R: AsRef<str>,
        A: AsRef<str>,
    {
        Self::with_config(range_specs, allowlist, builtin(), CacheConfig::default())
    }

    /// Build a checker resolving group names through `resolver`.
    pub fn with_config<R, A>(
        range_specs: &[R],
        allowlist: &[A],
        resolver: &dyn RangeGroupResolver,
        cache: CacheConfig,
    ) -> Result<Self>
    where
        R: AsRef<str>,
        A: AsRef<str>,
    {
        Self::with_clock(range_specs, allowlist, resolver, cache, Arc::new(SystemClock))
    }

    /// Like [`with_config`](Self::with_config) with an explicit cache clock.
    pub fn with_clock<R, A>(
        range_specs: &[R],
        allowlist: &[A],
        resolver: &dyn RangeGroupResolver,
        cache: CacheConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self>
    where
        R: AsRef<str>,
        A: AsRef<str>,
    {
        let allowlist = Allowlist::new(allowlist)?;
        let (table, report) = PrefixTable::build(range_specs, resolver);

        log::info!(
            "IP checker ready: {} ranges, {} groups, {} allow-listed addresses",
            report.inserted,
            report.groups.len(),
            allowlist.len()
        );

        Ok(Self {
            table,
            allowlist,
            cache: MembershipCache::with_clock(cache, clock),
            report,
        })
    }

    /// Build a checker from a [`CheckerConfig`].
    pub fn from_config(config: &CheckerConfig, resolver: &dyn RangeGroupResolver) -> Result<Self> {
        let ranges = config.resolved_ranges(resolver)?;
        Self::with_config(&ranges, &config.allowlist, resolver, config.cache.clone())
    }

    /// Whether the request from `client` should proceed.
    ///
    /// `client` may be a bare address or `host:port`. Allow-listed addresses
    /// always proceed; otherwise the request proceeds unless the address is
    /// in a configured range. Malformed addresses do not proceed.
    pub fn req_allowed(&self, ctx: &Context, client: &str) -> bool {
        match addr::parse_client_addr(client) {
            Ok(ip) => self.req_allowed_ip(ctx, ip),
            Err(e) => {
                log::warn!("Rejecting request from malformed address {:?}: {}", client, e);
                false
            }
        }
    }

    /// [`req_allowed`](Self::req_allowed) for an already parsed address.
    pub fn req_allowed_ip(&self, ctx: &Context, ip: IpAddr) -> bool {
        if self.allowlist.allowed(ip) {
            return true;
        }
        !self.ip_in_ranges_ip(ctx, ip)
    }

    /// [`req_allowed`](Self::req_allowed) for raw 4- or 16-byte address octets.
    pub fn req_allowed_bytes(&self, ctx: &Context, octets: &[u8]) -> bool {
        match addr::from_octets(octets) {
            Ok(ip) => self.req_allowed_ip(ctx, ip),
            Err(e) => {
                log::warn!("Rejecting request from malformed address: {}", e);
                false
            }
        }
    }

    /// Whether `client` is inside any configured range. The allow-list is
    /// not consulted. Malformed addresses are reported as not in range.
    pub fn ip_in_ranges(&self, ctx: &Context, client: &str) -> bool {
        match addr::parse_client_addr(client) {
            Ok(ip) => self.ip_in_ranges_ip(ctx, ip),
            Err(e) => {
                log::warn!("Invalid IP address format {:?}: {}", client, e);
                false
            }
        }
    }

    /// [`ip_in_ranges`](Self::ip_in_ranges) for an already parsed address.
    pub fn ip_in_ranges_ip(&self, ctx: &Context, ip: IpAddr) -> bool {
        let key = addr::cache_key(ip);
        self.cache.get_or_fetch(ctx, &key, || self.table.contains(ip))
    }

    /// Classify `client`, surfacing malformed input as
    /// [`Error::InvalidAddress`](crate::Error::InvalidAddress).
    pub fn classify(&self, ctx: &Context, client: &str) -> Result<Verdict> {
        let ip = addr::parse_client_addr(client)?;
        Ok(self.classify_ip(ctx, ip))
    }

    /// Classify an already parsed address.
    pub fn classify_ip(&self, ctx: &Context, ip: IpAddr) -> Verdict {
        if self.allowlist.allowed(ip) {
            Verdict::Allowlisted
        } else if self.ip_in_ranges_ip(ctx, ip) {
            Verdict::InRange
        } else {
            Verdict::NotInRange
        }
    }

    /// What happened while building the prefix table.
    pub fn build_report(&self) -> &BuildReport {
        &self.report
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop all cached results.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// The prefix table.
    pub fn table(&self) -> &PrefixTable {
        &self.table
    }

    /// The allow-list.
    pub fn allowlist(&self) -> &Allowlist {
        &self.allowlist
    }
}

impl fmt::Debug for IpChecker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpChecker")
            .field("prefixes", &self.table.len())
            .field("allowlist", &self.allowlist.len())
            .field("cache_config", self.cache.config())
            .field("cache", &self.cache.stats())
            .finish()
    }
}
