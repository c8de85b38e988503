//! Per-request access to LDAP authentication information
//!
//! A [`Connector`] is cheap: it borrows the manager and queries registered
//! at setup and is created for every request.

use crate::error::{DirectoryError, DirectoryResult};
use crate::manager::ConnectionManager;
use crate::query::{DirectoryQuery, LOGIN_PLACEHOLDER, PASSWORD_PLACEHOLDER, USERDN_PLACEHOLDER};
use crate::types::{DirectoryEntry, SearchResult};
use tracing::debug;

pub struct Connector<'a> {
    manager: &'a ConnectionManager,
    login_query: Option<&'a DirectoryQuery>,
    groups_query: Option<&'a DirectoryQuery>,
}

impl<'a> Connector<'a> {
    pub fn new(
        manager: &'a ConnectionManager,
        login_query: Option<&'a DirectoryQuery>,
        groups_query: Option<&'a DirectoryQuery>,
    ) -> Self {
        Self {
            manager,
            login_query,
            groups_query,
        }
    }

    /// Validate a login name and password.
    ///
    /// Returns the matching entry when the user exists and the password is
    /// correct, otherwise `None`. The caller cannot tell an unknown login
    /// from a wrong password.
    ///
    /// An empty password is always rejected: a simple bind with an empty
    /// password is an "unauthenticated" bind (RFC 4513 section 5.1.2) that
    /// servers accept without checking anything.
    ///
    /// Fails with [`DirectoryError::Configuration`] if no login query was
    /// registered. Errors while obtaining the service connection or running
    /// the login search are returned; only the password check folds directory
    /// errors into `None`.
    pub async fn authenticate(
        &self,
        login: &str,
        password: &str,
    ) -> DirectoryResult<Option<DirectoryEntry>> {
        if password.is_empty() {
            return Ok(None);
        }

        let search = self
            .login_query
            .ok_or_else(|| DirectoryError::config("login query was not registered during setup"))?;

        let result = {
            let mut conn = self.manager.connection().await?;
            search
                .execute(
                    &mut *conn,
                    &[(LOGIN_PLACEHOLDER, login), (PASSWORD_PLACEHOLDER, password)],
                )
                .await?
        };

        if result.len() > 1 {
            debug!(
                "Login {:?} matched {} entries; using the first",
                login,
                result.len()
            );
        }

        let entry = match result.into_iter().next() {
            Some(entry) if !entry.dn.is_empty() => entry,
            _ => return Ok(None),
        };

        if let Err(e) = self.verify(&entry.dn, password).await {
            if !e.is_directory_failure() {
                return Err(e);
            }
            debug!("Exception in authenticate with login {:?}: {}", login, e);
            return Ok(None);
        }

        Ok(Some(entry))
    }

    /// Open, bind and close a connection as `dn`
    async fn verify(&self, dn: &str, password: &str) -> DirectoryResult<()> {
        let mut conn = self.manager.user_connection(dn, password).await?;
        conn.unbind().await
    }

    /// Get the groups the user belongs to.
    ///
    /// Returns every entry the groups query matches for `user_dn`, or `None`
    /// if the search failed. Fails with [`DirectoryError::Configuration`] if
    /// no groups query was registered.
    pub async fn user_groups(&self, user_dn: &str) -> DirectoryResult<Option<SearchResult>> {
        let search = self
            .groups_query
            .ok_or_else(|| DirectoryError::config("groups query was not registered during setup"))?;

        let mut conn = self.manager.connection().await?;

        match search.execute(&mut *conn, &[(USERDN_PLACEHOLDER, user_dn)]).await {
            Ok(result) => Ok(Some(result)),
            Err(e) if e.is_directory_failure() => {
                debug!("Exception in user_groups with userdn {:?}: {}", user_dn, e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
