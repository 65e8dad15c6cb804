//! rangeguard - Fast IP range membership classification for request gating.
//!
//! This crate decides, for a client IP address, whether it belongs to one
//! of a configured set of networks: explicit CIDR blocks or named range
//! groups (crawler and cloud-provider networks), with an allow-list that
//! overrides everything.
//!
//! # Features
//!
//! - **Prefix table**: compressed binary trie, lookups in O(address bits)
//! - **IPv4/IPv6 agreement**: `10.1.2.3` and `::ffff:10.1.2.3` always match alike
//! - **Range groups**: symbolic names expanded through a [`RangeGroupResolver`]
//! - **Allow-list**: exact addresses that are never blocked
//! - **Membership cache**: TTL, early refresh, single-flight, negative caching
//! - **Hot reload**: swap configurations atomically with [`ReloadableChecker`]
//!
//! # Quick Start
//!
//! ```
//! use rangeguard::{Context, IpChecker, RangeRegistry, CacheConfig};
//!
//! let groups = RangeRegistry::new().with_group("openai", ["203.0.113.0/24"]);
//! let checker = IpChecker::with_config(
//!     &["openai", "10.0.0.0/8"],
//!     &["10.5.5.5"],
//!     &groups,
//!     CacheConfig::default(),
//! )
//! .unwrap();
//!
//! let ctx = Context::background();
//! assert!(!checker.req_allowed(&ctx, "203.0.113.10")); // in the openai group
//! assert!(checker.req_allowed(&ctx, "10.5.5.5")); // allow-listed
//! assert!(checker.req_allowed(&ctx, "192.0.2.1")); // matches nothing
//! ```
//!
//! # Decision Order
//!
//! 1. Malformed client address → rejected
//! 2. Allow-listed address → allowed
//! 3. Address in any configured range → rejected
//! 4. Otherwise → allowed

mod allowlist;
mod context;
mod error;
mod reload;

pub mod addr;
pub mod cache;
pub mod checker;
pub mod ranges;
pub mod table;

// Re-export core types
pub use allowlist::Allowlist;
pub use context::Context;
pub use tokio_util::sync::CancellationToken;
pub use error::{Error, Result};

// Re-export checker types
pub use checker::{CheckerConfig, DefaultRanges, IpChecker, Verdict};
pub use reload::ReloadableChecker;

// Re-export building blocks
pub use cache::{CacheConfig, CacheStats, MembershipCache};
pub use ranges::{RangeGroupResolver, RangeRegistry};
pub use table::{BuildReport, PrefixTable, SkippedRange};
