//! Directory search result types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single entry returned by a directory search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Distinguished name
    pub dn: String,

    /// Attribute values by attribute name; LDAP attributes are multi-valued
    #[serde(default)]
    pub attrs: HashMap<String, Vec<String>>,

    /// Values that are not valid UTF-8, such as `objectGUID` or `objectSid`
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub bin_attrs: HashMap<String, Vec<Vec<u8>>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
            bin_attrs: HashMap::new(),
        }
    }

    pub fn with_attr<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_bin_attr<I>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        self.bin_attrs
            .insert(name.into(), values.into_iter().collect());
        self
    }

    /// Get first value of an attribute
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attrs
            .get(name)
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }

    /// Get first value of a binary attribute
    pub fn get_binary_attribute(&self, name: &str) -> Option<&[u8]> {
        self.bin_attrs
            .get(name)
            .and_then(|v| v.first())
            .map(|b| b.as_slice())
    }
}

/// Entries in the order the server returned them
pub type SearchResult = Vec<DirectoryEntry>;
