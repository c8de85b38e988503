//! LDAP authentication and group resolution for dirauth
//!
//! Authenticates users against a directory with two templated searches:
//! - a login query resolving a login name to an entry, whose DN is then
//!   used to verify the password with a bind
//! - a groups query listing the groups of a user DN
//!
//! ```text
//! GroupFinder / Connector
//!         │
//!         ▼
//!  DirectoryQuery::execute ──► TimeBucketedCache
//!         │
//!         ▼
//!  ConnectionManager ──► DirectoryClient (ldap3)
//! ```
//!
//! Setup happens once through a [`DirectoryRegistry`]; each request then
//! asks it for a [`Connector`].

pub mod cache;
pub mod client;
pub mod connector;
pub mod error;
pub mod groupfinder;
pub mod manager;
pub mod query;
pub mod registry;
pub mod template;
pub mod types;

#[cfg(test)]
mod mock;

pub use cache::TimeBucketedCache;
pub use client::{DirectoryClient, DirectoryConnection, Ldap3Client};
pub use connector::Connector;
pub use error::{DirectoryError, DirectoryResult};
pub use groupfinder::{group_finder, GroupFinder, LdapGroupFinder};
pub use manager::{ConnectionManager, ManagerOptions, ServerDescriptor, ServiceConnection};
pub use query::{DirectoryQuery, SearchKey};
pub use registry::DirectoryRegistry;
pub use template::Template;
pub use types::{DirectoryEntry, SearchResult};

// Re-export shared types from core
pub use dirauth_core::SearchScope;
