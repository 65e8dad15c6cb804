//! Checker configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::cache::CacheConfig;
use crate::error::{Error, Result};
use crate::ranges::{read_range_file, RangeGroupResolver};

/// What to block when no ranges are configured at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultRanges {
    /// Block nothing.
    #[default]
    None,
    /// Block every group the resolver knows about.
    AllGroups,
}

impl DefaultRanges {
    /// Get the configuration name of this default.
    pub fn name(&self) -> &'static str {
        match self {
            DefaultRanges::None => "none",
            DefaultRanges::AllGroups => "all_groups",
        }
    }
}

/// Configuration for an [`IpChecker`](crate::IpChecker).
///
/// ```yaml
/// ranges: [openai, 10.0.0.0/8]
/// ranges_file: /etc/rangeguard/extra.txt
/// default_ranges: none
/// allowlist: [10.5.5.5]
/// cache:
///   capacity: 10000
///   ttl: 600
///   early_refresh: 60
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckerConfig {
    /// CIDR literals or range group names.
    pub ranges: Vec<String>,
    /// File of extra CIDRs, one per line.
    pub ranges_file: Option<PathBuf>,
    /// Applied only when `ranges` and `ranges_file` are both empty.
    pub default_ranges: DefaultRanges,
    /// Literal client addresses that are never blocked.
    pub allowlist: Vec<String>,
    /// Membership cache settings.
    pub cache: CacheConfig,
}

impl CheckerConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a file; `.json` files are read as JSON, anything else as YAML.
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    /// The range specs to build a table from: configured ranges, then the
    /// ranges file, or the configured default when both are empty.
    pub fn resolved_ranges(&self, resolver: &dyn RangeGroupResolver) -> Result<Vec<String>> {
        let mut ranges = self.ranges.clone();
        if let Some(ref path) = self.ranges_file {
            ranges.extend(read_range_file(path)?);
        }

        if ranges.is_empty() && self.ranges_file.is_none() {
            if self.default_ranges == DefaultRanges::AllGroups {
                ranges = resolver.group_names();
            }
            log::info!(
                "No ranges configured, default_ranges={} blocks {} groups",
                self.default_ranges.name(),
                ranges.len()
            );
        }

        Ok(ranges)
    }

    /// Strictly check the configuration.
    ///
    /// Unlike building a checker, which skips bad ranges, this rejects any
    /// range that is neither a known group nor a CIDR, any non-CIDR line in
    /// the ranges file, any allow-list entry that is not an address, and an
    /// early-refresh window that is not shorter than the TTL.
    pub fn validate(&self, resolver: &dyn RangeGroupResolver) -> Result<()> {
        for range in &self.ranges {
            let range = range.trim();
            if resolver.resolve(range).is_some() {
                continue;
            }
            if range.parse::<ipnet::IpNet>().is_err() {
                return Err(if range.contains('/') || range.parse::<IpAddr>().is_ok() {
                    Error::InvalidCidr(range.to_string())
                } else {
                    Error::UnknownRangeGroup(range.to_string())
                });
            }
        }

        if let Some(ref path) = self.ranges_file {
            for line in read_range_file(path)? {
                if line.parse::<ipnet::IpNet>().is_err() {
                    return Err(Error::InvalidCidr(format!(
                        "{} (in {})",
                        line,
                        path.display()
                    )));
                }
            }
        }

        for literal in &self.allowlist {
            if literal.trim().parse::<IpAddr>().is_err() {
                return Err(Error::InvalidAllowlistEntry(literal.clone()));
            }
        }

        if self.cache.enabled && self.cache.early_refresh >= self.cache.ttl {
            return Err(Error::Config(format!(
                "cache early_refresh ({}s) must be shorter than ttl ({}s)",
                self.cache.early_refresh.as_secs(),
                self.cache.ttl.as_secs()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::RangeRegistry;
    use std::io::Write;
    use std::time::Duration;

    fn registry() -> RangeRegistry {
        RangeRegistry::new()
            .with_group("openai", ["203.0.113.0/24"])
            .with_group("deepseek", ["198.51.100.0/24"])
    }

    #[test]
    fn test_yaml_config() {
        let yaml = r#"
ranges:
  - openai
  - 10.0.0.0/8
allowlist:
  - 10.5.5.5
cache:
  ttl: 120
"#;
        let config = CheckerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.ranges, vec!["openai", "10.0.0.0/8"]);
        assert_eq!(config.allowlist, vec!["10.5.5.5"]);
        assert_eq!(config.cache.ttl, Duration::from_secs(120));
        assert_eq!(config.cache.capacity, 10_000);
        assert_eq!(config.default_ranges, DefaultRanges::None);
    }

    #[test]
    fn test_json_config() {
        let json = r#"{"ranges": ["openai"], "default_ranges": "all_groups"}"#;
        let config = CheckerConfig::from_json_str(json).unwrap();
        assert_eq!(config.default_ranges, DefaultRanges::AllGroups);
        assert!(config.allowlist.is_empty());
    }

    #[test]
    fn test_default_ranges_name_matches_serde() {
        for default in [DefaultRanges::None, DefaultRanges::AllGroups] {
            let json = serde_json::to_string(&default).unwrap();
            assert_eq!(json, format!("\"{}\"", default.name()));
        }
    }

    #[test]
    fn test_unknown_default_rejected() {
        assert!(CheckerConfig::from_json_str(r#"{"default_ranges": "everything"}"#).is_err());
    }

    #[test]
    fn test_default_ranges_none() {
        let config = CheckerConfig::default();
        assert!(config.resolved_ranges(&registry()).unwrap().is_empty());
    }

    #[test]
    fn test_default_ranges_all_groups() {
        let config = CheckerConfig {
            default_ranges: DefaultRanges::AllGroups,
            ..Default::default()
        };
        assert_eq!(
            config.resolved_ranges(&registry()).unwrap(),
            vec!["deepseek".to_string(), "openai".to_string()]
        );
    }

    #[test]
    fn test_explicit_ranges_override_default() {
        let config = CheckerConfig {
            ranges: vec!["10.0.0.0/8".to_string()],
            default_ranges: DefaultRanges::AllGroups,
            ..Default::default()
        };
        assert_eq!(config.resolved_ranges(&registry()).unwrap(), vec!["10.0.0.0/8"]);
    }

    #[test]
    fn test_ranges_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# extra").unwrap();
        writeln!(file, "192.0.2.0/24").unwrap();
        writeln!(file, "2001:db8::/32").unwrap();

        let config = CheckerConfig {
            ranges: vec!["openai".to_string()],
            ranges_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert_eq!(
            config.resolved_ranges(&registry()).unwrap(),
            vec!["openai", "192.0.2.0/24", "2001:db8::/32"]
        );
        assert!(config.validate(&registry()).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_ranges_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "192.0.2.0/24").unwrap();
        writeln!(file, "nonsense").unwrap();

        let config = CheckerConfig {
            ranges_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(&registry()),
            Err(Error::InvalidCidr(_))
        ));
    }

    #[test]
    fn test_validate() {
        let ok = CheckerConfig {
            ranges: vec!["openai".to_string(), "10.0.0.0/8".to_string()],
            allowlist: vec!["10.5.5.5".to_string()],
            ..Default::default()
        };
        assert!(ok.validate(&registry()).is_ok());

        let unknown = CheckerConfig {
            ranges: vec!["doesnotexist".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            unknown.validate(&registry()),
            Err(Error::UnknownRangeGroup(_))
        ));

        let bad_cidr = CheckerConfig {
            ranges: vec!["10.0.0.0/33".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            bad_cidr.validate(&registry()),
            Err(Error::InvalidCidr(_))
        ));

        let bad_allow = CheckerConfig {
            allowlist: vec!["10.0.0.0/8".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            bad_allow.validate(&registry()),
            Err(Error::InvalidAllowlistEntry(_))
        ));

        let mut bad_cache = CheckerConfig::default();
        bad_cache.cache.early_refresh = bad_cache.cache.ttl;
        assert!(matches!(
            bad_cache.validate(&registry()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("rangeguard.yaml");
        fs::write(&yaml_path, "ranges: [openai]\n").unwrap();
        assert_eq!(
            CheckerConfig::from_path(&yaml_path).unwrap().ranges,
            vec!["openai"]
        );

        let json_path = dir.path().join("rangeguard.json");
        fs::write(&json_path, r#"{"allowlist": ["::1"]}"#).unwrap();
        assert_eq!(
            CheckerConfig::from_path(&json_path).unwrap().allowlist,
            vec!["::1"]
        );

        assert!(matches!(
            CheckerConfig::from_path(&dir.path().join("missing.yaml")),
            Err(Error::Io(_))
        ));
    }
}
