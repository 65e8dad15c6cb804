//! Named range groups.
//!
//! A range group maps a symbolic name such as `"openai"` or `"private"` to
//! the CIDR blocks that make up that network. Groups are populated by
//! external fetchers; the checker only reads them while building its table.

mod builtin;
mod file;

pub use builtin::{builtin, LOCALHOST_RANGES, PRIVATE_RANGES};
pub use file::{parse_range_list, read_range_file};

use ahash::AHashMap;
use std::collections::HashMap;
use std::io::Read;

use crate::error::Result;

/// Lookup from group name to CIDR list.
pub trait RangeGroupResolver: Send + Sync {
    /// CIDRs of the named group, or `None` if the name is unknown.
    fn resolve(&self, name: &str) -> Option<&[String]>;

    /// All known group names, sorted.
    fn group_names(&self) -> Vec<String>;
}

/// In-memory registry of range groups.
#[derive(Debug, Clone, Default)]
pub struct RangeRegistry {
    groups: AHashMap<String, Vec<String>>,
}

impl RangeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a group.
    pub fn insert<I, S>(&mut self, name: impl Into<String>, cidrs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .insert(name.into(), cidrs.into_iter().map(Into::into).collect());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_group<I, S>(mut self, name: impl Into<String>, cidrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(name, cidrs);
        self
    }

    /// Copy every group of `other` into this registry, replacing groups
    /// with the same name.
    pub fn merge(&mut self, other: &RangeRegistry) {
        for (name, cidrs) in &other.groups {
            self.groups.insert(name.clone(), cidrs.clone());
        }
    }

    /// Load groups from a JSON object of the form
    /// `{"openai": ["23.102.140.112/28", ...], ...}`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let groups: HashMap<String, Vec<String>> = serde_json::from_str(json)?;
        Ok(Self {
            groups: groups.into_iter().collect(),
        })
    }

    /// Load groups from a JSON reader. See [`from_json_str`](Self::from_json_str).
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self> {
        let groups: HashMap<String, Vec<String>> = serde_json::from_reader(reader)?;
        Ok(Self {
            groups: groups.into_iter().collect(),
        })
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the registry has no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Whether a group with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name)
    }
}

impl RangeGroupResolver for RangeRegistry {
    fn resolve(&self, name: &str) -> Option<&[String]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.keys().cloned().collect();
        names.sort();
        names
    }
}
