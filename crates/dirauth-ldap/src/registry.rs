//! Setup-time registration of the connection manager and queries
//!
//! The registry is populated once at startup, then shared (usually behind
//! an `Arc`) by every request, which obtains a [`Connector`] from it.

use crate::client::DirectoryClient;
use crate::connector::Connector;
use crate::error::{DirectoryError, DirectoryResult};
use crate::manager::{ConnectionManager, ManagerOptions};
use crate::query::DirectoryQuery;
use dirauth_core::{LdapConfig, SearchScope};
use std::sync::Arc;
use tracing::info;

#[derive(Default)]
pub struct DirectoryRegistry {
    manager: Option<ConnectionManager>,
    login_query: Option<DirectoryQuery>,
    groups_query: Option<DirectoryQuery>,
}

impl DirectoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the `[ldap]` configuration section
    pub fn from_config(
        config: &LdapConfig,
        client: Arc<dyn DirectoryClient>,
    ) -> DirectoryResult<Self> {
        config.validate()?;

        let mut registry = Self::new();
        registry.setup(client, ManagerOptions::from(config))?;

        if let Some(ref query) = config.login_query {
            registry.set_login_query(
                &query.base_dn,
                &query.filter,
                query.scope.unwrap_or(SearchScope::OneLevel),
                query.cache_period,
            )?;
        }
        if let Some(ref query) = config.groups_query {
            registry.set_groups_query(
                &query.base_dn,
                &query.filter,
                query.scope.unwrap_or(SearchScope::Subtree),
                query.cache_period,
            )?;
        }

        Ok(registry)
    }

    /// Register the connection manager. May only be called once.
    pub fn setup(
        &mut self,
        client: Arc<dyn DirectoryClient>,
        options: ManagerOptions,
    ) -> DirectoryResult<()> {
        if self.manager.is_some() {
            return Err(DirectoryError::config("LDAP setup was already performed"));
        }

        let manager = ConnectionManager::new(client, options)?;
        info!("LDAP setup: {}", manager);
        self.manager = Some(manager);
        Ok(())
    }

    /// Register the login search. The filter must contain `%(login)s`.
    ///
    /// Example: base `CN=Users,DC=example,DC=com`, filter
    /// `(sAMAccountName=%(login)s)`, scope [`SearchScope::OneLevel`].
    pub fn set_login_query(
        &mut self,
        base_dn: &str,
        filter: &str,
        scope: SearchScope,
        cache_period: u64,
    ) -> DirectoryResult<()> {
        if self.login_query.is_some() {
            return Err(DirectoryError::config("login query was already registered"));
        }

        let query = DirectoryQuery::for_login(base_dn, filter, scope, cache_period)?;
        info!("LDAP login query: {}", query);
        self.login_query = Some(query);
        Ok(())
    }

    /// Register the groups search. The filter must contain `%(userdn)s`.
    ///
    /// Example: base `DC=example,DC=com`, filter
    /// `(&(objectCategory=group)(member=%(userdn)s))`, scope
    /// [`SearchScope::Subtree`].
    pub fn set_groups_query(
        &mut self,
        base_dn: &str,
        filter: &str,
        scope: SearchScope,
        cache_period: u64,
    ) -> DirectoryResult<()> {
        if self.groups_query.is_some() {
            return Err(DirectoryError::config("groups query was already registered"));
        }

        let query = DirectoryQuery::for_groups(base_dn, filter, scope, cache_period)?;
        info!("LDAP groups query: {}", query);
        self.groups_query = Some(query);
        Ok(())
    }

    pub fn manager(&self) -> Option<&ConnectionManager> {
        self.manager.as_ref()
    }

    pub fn login_query(&self) -> Option<&DirectoryQuery> {
        self.login_query.as_ref()
    }

    pub fn groups_query(&self) -> Option<&DirectoryQuery> {
        self.groups_query.as_ref()
    }

    /// Drop every cached search result
    pub fn clear_caches(&self) {
        for query in [&self.login_query, &self.groups_query].into_iter().flatten() {
            query.clear_cache();
        }
        info!("LDAP query caches cleared");
    }

    /// Connector for the current request.
    ///
    /// Fails with [`DirectoryError::Configuration`] if [`setup`](Self::setup)
    /// was never called.
    pub fn connector(&self) -> DirectoryResult<Connector<'_>> {
        let manager = self.manager.as_ref().ok_or_else(|| {
            DirectoryError::config("LDAP setup must be performed before using a connector")
        })?;

        Ok(Connector::new(
            manager,
            self.login_query.as_ref(),
            self.groups_query.as_ref(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDirectory;
    use crate::types::DirectoryEntry;
    use dirauth_core::{DirauthConfig, QueryConfig};

    fn client() -> Arc<dyn DirectoryClient> {
        Arc::new(MockDirectory::new())
    }

    #[test]
    fn test_connector_without_setup_is_configuration_error() {
        let registry = DirectoryRegistry::new();

        let err = registry.connector().err().unwrap();

        assert!(matches!(err, DirectoryError::Configuration(_)));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = DirectoryRegistry::new();

        registry
            .setup(client(), ManagerOptions::new("ldap://dir.example.com"))
            .unwrap();
        assert!(registry
            .setup(client(), ManagerOptions::new("ldap://dir.example.com"))
            .is_err());

        registry
            .set_login_query("DC=example,DC=com", "(uid=%(login)s)", SearchScope::OneLevel, 0)
            .unwrap();
        assert!(registry
            .set_login_query("DC=example,DC=com", "(uid=%(login)s)", SearchScope::OneLevel, 0)
            .is_err());

        registry
            .set_groups_query("DC=example,DC=com", "(member=%(userdn)s)", SearchScope::Subtree, 0)
            .unwrap();
        assert!(registry
            .set_groups_query("DC=example,DC=com", "(member=%(userdn)s)", SearchScope::Subtree, 0)
            .is_err());
    }

    #[test]
    fn test_invalid_template_rejected_at_registration() {
        let mut registry = DirectoryRegistry::new();

        let err = registry
            .set_login_query("DC=example,DC=com", "(uid=%(username)s)", SearchScope::OneLevel, 0)
            .unwrap_err();

        assert!(matches!(err, DirectoryError::InvalidTemplate(_)));
        assert!(registry.login_query().is_none());
    }

    #[test]
    fn test_from_config_applies_scope_defaults() {
        let config = LdapConfig {
            uri: "ldaps://dir.example.com".to_string(),
            use_pool: false,
            login_query: Some(QueryConfig {
                base_dn: "CN=Users,DC=example,DC=com".to_string(),
                filter: "(sAMAccountName=%(login)s)".to_string(),
                scope: None,
                cache_period: 0,
            }),
            groups_query: Some(QueryConfig {
                base_dn: "DC=example,DC=com".to_string(),
                filter: "(member=%(userdn)s)".to_string(),
                scope: None,
                cache_period: 30,
            }),
            ..Default::default()
        };

        let registry = DirectoryRegistry::from_config(&config, client()).unwrap();

        let manager = registry.manager().unwrap();
        assert_eq!(manager.server().port, 636);
        assert!(!manager.is_pooled());
        assert_eq!(registry.login_query().unwrap().scope(), SearchScope::OneLevel);
        assert_eq!(registry.groups_query().unwrap().scope(), SearchScope::Subtree);
        assert_eq!(registry.groups_query().unwrap().cache_period(), 30);
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let mut config = DirauthConfig::default().ldap;
        config.uri = "http://dir.example.com".to_string();

        let err = DirectoryRegistry::from_config(&config, client()).err().unwrap();

        assert!(matches!(err, DirectoryError::Core(_)));
    }

    #[tokio::test]
    async fn test_authenticate_through_registry() {
        let directory = MockDirectory::new()
            .with_result(
                "(sAMAccountName=alice)",
                vec![DirectoryEntry::new("CN=Alice,DC=example,DC=com")],
            )
            .with_password("CN=Alice,DC=example,DC=com", "wonderland");

        let mut registry = DirectoryRegistry::new();
        registry
            .setup(
                Arc::new(directory),
                ManagerOptions::new("dir.example.com").pool_size(2),
            )
            .unwrap();
        registry
            .set_login_query(
                "DC=example,DC=com",
                "(sAMAccountName=%(login)s)",
                SearchScope::OneLevel,
                0,
            )
            .unwrap();

        let connector = registry.connector().unwrap();

        assert!(connector.authenticate("alice", "wonderland").await.unwrap().is_some());
        assert!(connector.authenticate("alice", "").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_caches() {
        let directory = MockDirectory::new();
        let mut registry = DirectoryRegistry::new();
        registry
            .setup(
                Arc::new(directory.clone()),
                ManagerOptions::new("dir.example.com").use_pool(false),
            )
            .unwrap();
        registry
            .set_groups_query(
                "DC=example,DC=com",
                "(member=%(userdn)s)",
                SearchScope::Subtree,
                3600,
            )
            .unwrap();

        let connector = registry.connector().unwrap();
        connector.user_groups("CN=Alice,DC=example,DC=com").await.unwrap();
        assert_eq!(registry.groups_query().unwrap().cached_results(), 1);

        registry.clear_caches();

        assert_eq!(registry.groups_query().unwrap().cached_results(), 0);
        assert_eq!(directory.searches().len(), 1);
    }
}
