//! Group lookup for an external authorization layer

use crate::error::DirectoryResult;
use crate::registry::DirectoryRegistry;
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves the principals (group DNs) of an authenticated user.
///
/// `Ok(None)` means the groups could not be resolved, which is distinct from
/// a user that belongs to no groups (`Ok(Some(vec![]))`).
#[async_trait]
pub trait GroupFinder: Send + Sync {
    async fn find_groups(&self, user_dn: &str) -> DirectoryResult<Option<Vec<String>>>;
}

/// Return the DN of each group `user_dn` belongs to
pub async fn group_finder(
    user_dn: &str,
    registry: &DirectoryRegistry,
) -> DirectoryResult<Option<Vec<String>>> {
    let connector = registry.connector()?;

    let groups = connector.user_groups(user_dn).await?;

    Ok(groups.map(|entries| entries.into_iter().map(|group| group.dn).collect()))
}

/// [`GroupFinder`] backed by a shared registry
#[derive(Clone)]
pub struct LdapGroupFinder {
    registry: Arc<DirectoryRegistry>,
}

impl LdapGroupFinder {
    pub fn new(registry: Arc<DirectoryRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl GroupFinder for LdapGroupFinder {
    async fn find_groups(&self, user_dn: &str) -> DirectoryResult<Option<Vec<String>>> {
        group_finder(user_dn, &self.registry).await
    }
}
