//! Groups that ship with the crate.

use once_cell::sync::Lazy;

use super::RangeRegistry;

/// Loopback and RFC 1918 / ULA networks.
pub const PRIVATE_RANGES: &[&str] = &[
    "127.0.0.0/8",
    "::1/128",
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "fd00::/8",
];

/// IPv4 and IPv6 loopback.
pub const LOCALHOST_RANGES: &[&str] = &["127.0.0.0/8", "::1/128"];

static BUILTIN: Lazy<RangeRegistry> = Lazy::new(|| {
    RangeRegistry::new()
        .with_group("private", PRIVATE_RANGES.iter().copied())
        .with_group("localhost", LOCALHOST_RANGES.iter().copied())
});

/// The built-in registry (`private`, `localhost`).
///
/// Provider groups are not bundled; merge them into a copy of this registry
/// with [`RangeRegistry::merge`].
pub fn builtin() -> &'static RangeRegistry {
    &BUILTIN
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::RangeGroupResolver;

    #[test]
    fn test_builtin_groups() {
        let registry = builtin();
        assert_eq!(
            registry.group_names(),
            vec!["localhost".to_string(), "private".to_string()]
        );
        assert_eq!(registry.resolve("private").unwrap().len(), 6);
        assert_eq!(registry.resolve("localhost").unwrap().len(), 2);
    }

    #[test]
    fn test_builtin_ranges_parse() {
        for cidr in PRIVATE_RANGES.iter().chain(LOCALHOST_RANGES) {
            assert!(cidr.parse::<ipnet::IpNet>().is_ok(), "{}", cidr);
        }
    }
}
