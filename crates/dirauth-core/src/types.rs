//! Shared directory types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Search breadth below the base DN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// The base object only
    Base,
    /// Immediate children of the base object
    OneLevel,
    /// The base object and its whole subtree
    Subtree,
}

impl fmt::Display for SearchScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SearchScope::Base => "base",
            SearchScope::OneLevel => "one_level",
            SearchScope::Subtree => "subtree",
        };
        f.write_str(name)
    }
}
