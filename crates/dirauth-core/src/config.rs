//! Configuration for dirauth

use crate::types::SearchScope;
use serde::{Deserialize, Serialize};

const REDACTED: &str = "******";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirauthConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ldap: LdapConfig,
}

impl DirauthConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| crate::Error::ConfigParse(e.to_string()))
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(uri) = env_var("LDAP_URI") {
            config.ldap.uri = uri;
        }
        if let Some(bind_dn) = env_var("LDAP_BIND_DN") {
            config.ldap.bind_dn = Some(bind_dn);
        }
        if let Some(password) = env_var("LDAP_BIND_PASSWORD") {
            config.ldap.bind_password = Some(password);
        }
        if let Some(use_tls) = env_var("LDAP_USE_TLS") {
            config.ldap.use_tls = use_tls == "true";
        }
        if let Some(use_pool) = env_var("LDAP_USE_POOL") {
            config.ldap.use_pool = use_pool == "true";
        }
        if let Some(size) = env_var("LDAP_POOL_SIZE") {
            match size.parse() {
                Ok(size) => config.ldap.pool_size = size,
                Err(_) => tracing::warn!("Ignoring invalid DIRAUTH_LDAP_POOL_SIZE: {}", size),
            }
        }
        if let Some(level) = env_var("LOG_LEVEL") {
            config.logging.level = level;
        }

        config
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.ldap.validate()
    }

    /// Copy of the configuration with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.ldap.bind_password.is_some() {
            config.ldap.bind_password = Some(REDACTED.to_string());
        }
        config
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", crate::ENV_PREFIX, name)).ok()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// LDAP directory configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// Directory URI, `[scheme://]host[:port]`
    /// Example: "ldaps://dir.example.com" or "dir.example.com:1389"
    #[serde(default = "default_ldap_uri")]
    pub uri: String,

    /// Service account used for trusted searches
    #[serde(default)]
    pub bind_dn: Option<String>,

    #[serde(default)]
    pub bind_password: Option<String>,

    /// Upgrade plaintext connections with STARTTLS
    #[serde(default)]
    pub use_tls: bool,

    /// Keep bound service connections in a pool
    #[serde(default = "default_use_pool")]
    pub use_pool: bool,

    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Skip TLS certificate verification (not recommended for production)
    #[serde(default)]
    pub skip_tls_verify: bool,

    /// Search used to resolve a login name to an entry.
    /// The filter must contain `%(login)s`.
    #[serde(default)]
    pub login_query: Option<QueryConfig>,

    /// Search used to list the groups of a user DN.
    /// The filter must contain `%(userdn)s`.
    #[serde(default)]
    pub groups_query: Option<QueryConfig>,
}

fn default_ldap_uri() -> String {
    "ldap://localhost:389".to_string()
}

fn default_use_pool() -> bool {
    true
}

fn default_pool_size() -> usize {
    10
}

fn default_timeout() -> u64 {
    10
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            uri: default_ldap_uri(),
            bind_dn: None,
            bind_password: None,
            use_tls: false,
            use_pool: default_use_pool(),
            pool_size: default_pool_size(),
            timeout_seconds: default_timeout(),
            skip_tls_verify: false,
            login_query: None,
            groups_query: None,
        }
    }
}

impl LdapConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.uri.trim().is_empty() {
            return Err(crate::Error::InvalidConfig("ldap.uri is required".into()));
        }

        if let Some((scheme, _)) = self.uri.split_once("://") {
            if !scheme.eq_ignore_ascii_case("ldap") && !scheme.eq_ignore_ascii_case("ldaps") {
                return Err(crate::Error::InvalidConfig(format!(
                    "ldap.uri must use ldap:// or ldaps://, got {}://",
                    scheme
                )));
            }
        }

        if self.use_pool && self.pool_size == 0 {
            return Err(crate::Error::InvalidConfig(
                "ldap.pool_size must be at least 1 when use_pool is enabled".into(),
            ));
        }

        if let Some(ref query) = self.login_query {
            query.validate("login_query")?;
        }
        if let Some(ref query) = self.groups_query {
            query.validate("groups_query")?;
        }

        Ok(())
    }
}

/// A templated directory search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Base DN, may contain `%(name)s` placeholders
    pub base_dn: String,

    /// Search filter template
    pub filter: String,

    /// Defaults to one_level for the login query and subtree for the groups query
    #[serde(default)]
    pub scope: Option<SearchScope>,

    /// Seconds to cache results; 0 disables caching
    #[serde(default)]
    pub cache_period: u64,
}

impl QueryConfig {
    fn validate(&self, section: &str) -> crate::Result<()> {
        if self.filter.trim().is_empty() {
            return Err(crate::Error::InvalidConfig(format!(
                "ldap.{}.filter is required",
                section
            )));
        }
        Ok(())
    }
}
