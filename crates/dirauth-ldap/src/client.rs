//! Directory client abstraction
//!
//! The connector only ever needs to open a connection, bind, search and
//! close. [`DirectoryClient`] and [`DirectoryConnection`] capture exactly
//! that, with [`Ldap3Client`] as the production implementation.

use crate::error::DirectoryResult;
use crate::manager::ServerDescriptor;
use crate::types::{DirectoryEntry, SearchResult};
use async_trait::async_trait;
use dirauth_core::{LdapConfig, SearchScope};
use ldap3::exop::WhoAmI;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, Scope, SearchEntry};
use std::time::Duration;
use tracing::{debug, warn};

/// An open connection to a directory server
#[async_trait]
pub trait DirectoryConnection: Send {
    /// Simple bind; an error means the credentials were not accepted
    async fn bind(&mut self, dn: &str, password: &str) -> DirectoryResult<()>;

    async fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
    ) -> DirectoryResult<SearchResult>;

    /// Cheap round trip used to check pooled connections before reuse
    async fn ping(&mut self) -> DirectoryResult<()>;

    async fn unbind(&mut self) -> DirectoryResult<()>;
}

/// Opens connections to a directory server
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn connect(&self, server: &ServerDescriptor)
        -> DirectoryResult<Box<dyn DirectoryConnection>>;
}

/// [`DirectoryClient`] backed by the `ldap3` crate
#[derive(Debug, Clone)]
pub struct Ldap3Client {
    timeout: Duration,
    skip_tls_verify: bool,
}

impl Ldap3Client {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            skip_tls_verify: false,
        }
    }

    pub fn from_config(config: &LdapConfig) -> Self {
        Self::new(Duration::from_secs(config.timeout_seconds))
            .skip_tls_verify(config.skip_tls_verify)
    }

    pub fn skip_tls_verify(mut self, skip: bool) -> Self {
        self.skip_tls_verify = skip;
        self
    }

    fn settings(&self, server: &ServerDescriptor) -> LdapConnSettings {
        LdapConnSettings::new()
            .set_conn_timeout(self.timeout)
            .set_starttls(server.start_tls && !server.use_ssl)
            .set_no_tls_verify(self.skip_tls_verify)
    }
}

impl Default for Ldap3Client {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl DirectoryClient for Ldap3Client {
    async fn connect(
        &self,
        server: &ServerDescriptor,
    ) -> DirectoryResult<Box<dyn DirectoryConnection>> {
        let url = server.url();
        debug!("Connecting to LDAP server: {}", url);

        let (conn, ldap) = LdapConnAsync::with_settings(self.settings(server), &url).await?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection driver error: {}", e);
            }
        });

        Ok(Box::new(Ldap3Connection { ldap }))
    }
}

struct Ldap3Connection {
    ldap: Ldap,
}

#[async_trait]
impl DirectoryConnection for Ldap3Connection {
    async fn bind(&mut self, dn: &str, password: &str) -> DirectoryResult<()> {
        self.ldap.simple_bind(dn, password).await?.success()?;
        Ok(())
    }

    async fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
    ) -> DirectoryResult<SearchResult> {
        let (rs, _res) = self
            .ldap
            .search(base_dn, to_ldap3_scope(scope), filter, vec!["*"])
            .await?
            .success()?;

        Ok(rs
            .into_iter()
            .map(|result| SearchEntry::construct(result).into())
            .collect())
    }

    async fn ping(&mut self) -> DirectoryResult<()> {
        self.ldap.extended(WhoAmI).await?;
        Ok(())
    }

    async fn unbind(&mut self) -> DirectoryResult<()> {
        self.ldap.unbind().await?;
        Ok(())
    }
}

impl From<SearchEntry> for DirectoryEntry {
    /// `ldap3` moves values that are not valid UTF-8 into `bin_attrs`
    fn from(entry: SearchEntry) -> Self {
        Self {
            dn: entry.dn,
            attrs: entry.attrs,
            bin_attrs: entry.bin_attrs,
        }
    }
}

fn to_ldap3_scope(scope: SearchScope) -> Scope {
    match scope {
        SearchScope::Base => Scope::Base,
        SearchScope::OneLevel => Scope::OneLevel,
        SearchScope::Subtree => Scope::Subtree,
    }
}
