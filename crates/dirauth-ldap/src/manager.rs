//! LDAP connection management
//!
//! A [`ConnectionManager`] is built once at setup. It hands out two kinds of
//! connections:
//! - service connections, bound as the configured service identity and used
//!   for trusted searches, either drawn from a pool or opened per call
//! - user connections, bound as an end user purely to verify a password;
//!   these are never pooled

use crate::client::{DirectoryClient, DirectoryConnection};
use crate::error::{DirectoryError, DirectoryResult};
use async_trait::async_trait;
use deadpool::managed::{self, Metrics, Pool, PoolError, RecycleError, RecycleResult};
use dirauth_core::LdapConfig;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_LDAP_PORT: u16 = 389;
pub const DEFAULT_LDAPS_PORT: u16 = 636;

/// Identifier used when logging pool activity
pub const POOL_NAME: &str = "dirauth";

// ============================================================================
// Server descriptor
// ============================================================================

/// Where and how to reach the directory server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerDescriptor {
    pub host: String,
    pub port: u16,
    /// Implicit TLS (`ldaps`)
    pub use_ssl: bool,
    /// Upgrade a plaintext connection with STARTTLS
    pub start_tls: bool,
}

impl ServerDescriptor {
    /// Parse `[scheme://]host[:port]`. A missing scheme means `ldap`.
    pub fn parse(uri: &str, use_tls: bool) -> DirectoryResult<Self> {
        let uri = uri.trim();
        let full = if uri.contains("://") {
            uri.to_string()
        } else {
            format!("ldap://{}", uri)
        };

        let parsed =
            Url::parse(&full).map_err(|e| DirectoryError::InvalidUri(format!("{}: {}", uri, e)))?;

        let use_ssl = match parsed.scheme() {
            "ldap" => false,
            "ldaps" => true,
            other => {
                return Err(DirectoryError::InvalidUri(format!(
                    "{}: unsupported scheme '{}'",
                    uri, other
                )))
            }
        };

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| DirectoryError::InvalidUri(format!("{}: missing host", uri)))?
            .to_string();

        let port = parsed.port().unwrap_or(if use_ssl {
            DEFAULT_LDAPS_PORT
        } else {
            DEFAULT_LDAP_PORT
        });

        Ok(Self {
            host,
            port,
            use_ssl,
            start_tls: use_tls && !use_ssl,
        })
    }

    pub fn is_encrypted(&self) -> bool {
        self.use_ssl || self.start_tls
    }

    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

// ============================================================================
// Manager options
// ============================================================================

#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub uri: String,
    pub bind_dn: Option<String>,
    pub bind_password: Option<String>,
    pub use_tls: bool,
    pub use_pool: bool,
    pub pool_size: usize,
}

impl ManagerOptions {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn bind(mut self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.bind_dn = Some(dn.into());
        self.bind_password = Some(password.into());
        self
    }

    pub fn use_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    pub fn use_pool(mut self, use_pool: bool) -> Self {
        self.use_pool = use_pool;
        self
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            uri: "ldap://localhost".to_string(),
            bind_dn: None,
            bind_password: None,
            use_tls: false,
            use_pool: true,
            pool_size: 10,
        }
    }
}

impl From<&LdapConfig> for ManagerOptions {
    fn from(config: &LdapConfig) -> Self {
        Self {
            uri: config.uri.clone(),
            bind_dn: config.bind_dn.clone(),
            bind_password: config.bind_password.clone(),
            use_tls: config.use_tls,
            use_pool: config.use_pool,
            pool_size: config.pool_size,
        }
    }
}

// ============================================================================
// Service connections
// ============================================================================

/// Opens connections bound as the service identity; also the pool manager
pub struct ServiceConnections {
    client: Arc<dyn DirectoryClient>,
    server: ServerDescriptor,
    bind: Option<(String, String)>,
}

impl ServiceConnections {
    async fn open(&self) -> DirectoryResult<Box<dyn DirectoryConnection>> {
        let mut conn = self.client.connect(&self.server).await?;

        if let Some((ref dn, ref password)) = self.bind {
            conn.bind(dn, password).await?;
        }

        Ok(conn)
    }
}

#[async_trait]
impl managed::Manager for ServiceConnections {
    type Type = Box<dyn DirectoryConnection>;
    type Error = DirectoryError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        debug!("Opening pooled connection for pool '{}'", POOL_NAME);
        self.open().await
    }

    async fn recycle(&self, conn: &mut Self::Type, _: &Metrics) -> RecycleResult<Self::Error> {
        conn.ping().await.map_err(RecycleError::Backend)
    }
}

enum Strategy {
    Pooled(Pool<ServiceConnections>),
    Dedicated(ServiceConnections),
}

/// A bound service connection; pooled connections return to the pool on drop
pub enum ServiceConnection {
    Pooled(managed::Object<ServiceConnections>),
    Dedicated(Box<dyn DirectoryConnection>),
}

impl Deref for ServiceConnection {
    type Target = dyn DirectoryConnection;

    fn deref(&self) -> &Self::Target {
        match self {
            ServiceConnection::Pooled(obj) => &***obj,
            ServiceConnection::Dedicated(conn) => &**conn,
        }
    }
}

impl DerefMut for ServiceConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            ServiceConnection::Pooled(obj) => &mut ***obj,
            ServiceConnection::Dedicated(conn) => &mut **conn,
        }
    }
}

// ============================================================================
// Connection manager
// ============================================================================

pub struct ConnectionManager {
    uri: String,
    server: ServerDescriptor,
    client: Arc<dyn DirectoryClient>,
    bind_dn: Option<String>,
    pool_size: Option<usize>,
    strategy: Strategy,
}

impl ConnectionManager {
    pub fn new(client: Arc<dyn DirectoryClient>, options: ManagerOptions) -> DirectoryResult<Self> {
        let server = ServerDescriptor::parse(&options.uri, options.use_tls)?;

        let bind = match options.bind_dn.clone().filter(|dn| !dn.is_empty()) {
            Some(dn) => {
                let password = options.bind_password.clone().unwrap_or_default();
                if password.is_empty() {
                    warn!("Service bind DN {} has no password; binds will be unauthenticated", dn);
                }
                Some((dn, password))
            }
            None => None,
        };

        let connections = ServiceConnections {
            client: client.clone(),
            server: server.clone(),
            bind,
        };

        let (strategy, pool_size) = if options.use_pool {
            if options.pool_size == 0 {
                return Err(DirectoryError::config("pool_size must be at least 1"));
            }
            let pool = Pool::builder(connections)
                .max_size(options.pool_size)
                .build()
                .map_err(|e| DirectoryError::Pool(e.to_string()))?;
            info!(
                "Created LDAP connection pool '{}' for {} (size {})",
                POOL_NAME,
                server.url(),
                options.pool_size
            );
            (Strategy::Pooled(pool), Some(options.pool_size))
        } else {
            (Strategy::Dedicated(connections), None)
        };

        Ok(Self {
            uri: options.uri,
            server,
            client,
            bind_dn: options.bind_dn,
            pool_size,
            strategy,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn server(&self) -> &ServerDescriptor {
        &self.server
    }

    pub fn is_pooled(&self) -> bool {
        matches!(self.strategy, Strategy::Pooled(_))
    }

    pub fn pool_size(&self) -> Option<usize> {
        self.pool_size
    }

    /// A connection bound as the service identity, for trusted searches
    pub async fn connection(&self) -> DirectoryResult<ServiceConnection> {
        match &self.strategy {
            Strategy::Pooled(pool) => match pool.get().await {
                Ok(obj) => Ok(ServiceConnection::Pooled(obj)),
                Err(PoolError::Backend(e)) => Err(e),
                Err(e) => Err(DirectoryError::Pool(e.to_string())),
            },
            Strategy::Dedicated(connections) => {
                Ok(ServiceConnection::Dedicated(connections.open().await?))
            }
        }
    }

    /// A fresh connection bound as `dn`, used only to verify a password.
    ///
    /// An empty password would make the server perform an unauthenticated
    /// bind (RFC 4513 section 5.1.2), which succeeds without checking
    /// anything, so it is refused before any network call.
    pub async fn user_connection(
        &self,
        dn: &str,
        password: &str,
    ) -> DirectoryResult<Box<dyn DirectoryConnection>> {
        if dn.is_empty() || password.is_empty() {
            return Err(DirectoryError::UnauthenticatedBind(dn.to_string()));
        }

        let mut conn = self.client.connect(&self.server).await?;
        conn.bind(dn, password).await?;
        Ok(conn)
    }
}

impl fmt::Display for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pool = match self.pool_size {
            Some(size) => size.to_string(),
            None => "none".to_string(),
        };
        write!(
            f,
            "uri={}, bind={}/******, pool={}",
            self.uri,
            self.bind_dn.as_deref().unwrap_or(""),
            pool
        )
    }
}
