//! Dirauth Core Library
//!
//! Configuration, error types and shared directory types for dirauth.

pub mod config;
pub mod error;
pub mod types;

pub use config::{DirauthConfig, LdapConfig, LoggingConfig, QueryConfig};
pub use error::{Error, Result};
pub use types::SearchScope;

/// Dirauth version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "DIRAUTH_";
