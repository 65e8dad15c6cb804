//! Configuration reloads without downtime.

use arc_swap::ArcSwap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::checker::{CheckerConfig, IpChecker};
use crate::context::Context;
use crate::error::Result;
use crate::ranges::RangeGroupResolver;

/// An [`IpChecker`] that can be replaced atomically.
///
/// A reload swaps in a freshly built checker; the old checker, its table
/// and its cache are dropped once the last in-flight lookup using them
/// finishes. New lookups see the new checker immediately.
///
/// # Example
///
/// ```
/// use rangeguard::{Context, IpChecker, ReloadableChecker};
///
/// let no_allowlist: &[&str] = &[];
/// let checker = ReloadableChecker::new(IpChecker::new(&["10.0.0.0/8"], no_allowlist).unwrap());
/// let ctx = Context::background();
/// assert!(!checker.req_allowed(&ctx, "10.0.0.1"));
///
/// checker.reload(IpChecker::new(&["192.0.2.0/24"], no_allowlist).unwrap());
/// assert!(checker.req_allowed(&ctx, "10.0.0.1"));
/// assert_eq!(checker.generation(), 1);
/// ```
pub struct ReloadableChecker {
    inner: ArcSwap<IpChecker>,
    /// Incremented on each reload.
    generation: AtomicU64,
}

impl ReloadableChecker {
    pub fn new(checker: IpChecker) -> Self {
        Self {
            inner: ArcSwap::from_pointee(checker),
            generation: AtomicU64::new(0),
        }
    }

    /// Build the initial checker from configuration.
    pub fn from_config(config: &CheckerConfig, resolver: &dyn RangeGroupResolver) -> Result<Self> {
        Ok(Self::new(IpChecker::from_config(config, resolver)?))
    }

    /// Replace the current checker.
    pub fn reload(&self, checker: IpChecker) {
        self.inner.store(Arc::new(checker));
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::info!("Reloaded IP checker (generation {})", generation);
    }

    /// Build a checker from `config` and swap it in. On error the current
    /// checker stays in place.
    pub fn reload_from_config(
        &self,
        config: &CheckerConfig,
        resolver: &dyn RangeGroupResolver,
    ) -> Result<()> {
        let checker = IpChecker::from_config(config, resolver).map_err(|e| {
            log::error!("Failed to reload IP checker, keeping current one: {}", e);
            e
        })?;
        self.reload(checker);
        Ok(())
    }

    /// A snapshot of the current checker.
    pub fn current(&self) -> Arc<IpChecker> {
        self.inner.load_full()
    }

    /// Get the current generation (incremented on each reload).
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// See [`IpChecker::req_allowed`].
    pub fn req_allowed(&self, ctx: &Context, client: &str) -> bool {
        self.inner.load().req_allowed(ctx, client)
    }

    /// See [`IpChecker::req_allowed_ip`].
    pub fn req_allowed_ip(&self, ctx: &Context, ip: IpAddr) -> bool {
        self.inner.load().req_allowed_ip(ctx, ip)
    }

    /// See [`IpChecker::ip_in_ranges`].
    pub fn ip_in_ranges(&self, ctx: &Context, client: &str) -> bool {
        self.inner.load().ip_in_ranges(ctx, client)
    }
}
