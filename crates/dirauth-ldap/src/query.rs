//! Templated directory searches
//!
//! A [`DirectoryQuery`] is registered once at setup and shared by every
//! request. Results may be cached in a [`TimeBucketedCache`] keyed by the
//! rendered search.

use crate::cache::{Clock, TimeBucketedCache};
use crate::client::DirectoryConnection;
use crate::error::DirectoryResult;
use crate::template::{escape_dn_value, escape_filter_value, verbatim, Escape, Params, Template};
use crate::types::SearchResult;
use dirauth_core::SearchScope;
use std::fmt;
use tracing::debug;

pub const LOGIN_PLACEHOLDER: &str = "login";
pub const PASSWORD_PLACEHOLDER: &str = "password";
pub const USERDN_PLACEHOLDER: &str = "userdn";

/// A fully rendered search; also the cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    pub base_dn: String,
    pub filter: String,
    pub scope: SearchScope,
}

pub struct DirectoryQuery {
    base_dn: Template,
    base_escape: Escape,
    filter: Template,
    scope: SearchScope,
    cache: TimeBucketedCache<SearchKey, SearchResult>,
}

impl DirectoryQuery {
    pub fn new(
        base_dn: &str,
        filter: &str,
        scope: SearchScope,
        cache_period: u64,
    ) -> DirectoryResult<Self> {
        Ok(Self {
            base_dn: Template::parse(base_dn)?,
            base_escape: escape_dn_value,
            filter: Template::parse(filter)?,
            scope,
            cache: TimeBucketedCache::new(cache_period),
        })
    }

    /// Login search: the filter must use `%(login)s`; `%(password)s` is
    /// also available.
    pub fn for_login(
        base_dn: &str,
        filter: &str,
        scope: SearchScope,
        cache_period: u64,
    ) -> DirectoryResult<Self> {
        let query = Self::new(base_dn, filter, scope, cache_period)?;
        query.filter.require(LOGIN_PLACEHOLDER)?;
        query.check_placeholders(&[LOGIN_PLACEHOLDER, PASSWORD_PLACEHOLDER])?;
        Ok(query)
    }

    /// Group search: the filter must use `%(userdn)s`.
    pub fn for_groups(
        base_dn: &str,
        filter: &str,
        scope: SearchScope,
        cache_period: u64,
    ) -> DirectoryResult<Self> {
        let mut query = Self::new(base_dn, filter, scope, cache_period)?;
        query.filter.require(USERDN_PLACEHOLDER)?;
        query.check_placeholders(&[USERDN_PLACEHOLDER])?;
        // userdn is already a DN
        query.base_escape = verbatim;
        Ok(query)
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.cache = TimeBucketedCache::with_clock(self.cache.period(), clock);
        self
    }

    fn check_placeholders(&self, allowed: &[&str]) -> DirectoryResult<()> {
        self.base_dn.allow_only(allowed)?;
        self.filter.allow_only(allowed)
    }

    pub fn scope(&self) -> SearchScope {
        self.scope
    }

    pub fn cache_period(&self) -> u64 {
        self.cache.period()
    }

    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn render(&self, params: &Params<'_>) -> DirectoryResult<SearchKey> {
        Ok(SearchKey {
            base_dn: self.base_dn.render(params, self.base_escape)?,
            filter: self.filter.render(params, escape_filter_value)?,
            scope: self.scope,
        })
    }

    /// Run the search on `conn`, or answer it from the cache.
    /// Transport errors are returned unchanged; nothing is retried.
    pub async fn execute(
        &self,
        conn: &mut dyn DirectoryConnection,
        params: &Params<'_>,
    ) -> DirectoryResult<SearchResult> {
        let key = self.render(params)?;

        debug!("Searching for {:?}", key);

        if !self.cache.is_enabled() {
            return conn.search(&key.base_dn, key.scope, &key.filter).await;
        }

        if let Some(result) = self.cache.get(&key) {
            debug!("Result for {:?} retrieved from cache", key);
            return Ok(result);
        }

        let result = conn.search(&key.base_dn, key.scope, &key.filter).await?;
        debug!("Search returned {} entries", result.len());
        self.cache.put(key, result.clone());

        Ok(result)
    }
}

impl fmt::Display for DirectoryQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "base_dn={}, filter={}, scope={}, cache_period={}",
            self.base_dn,
            self.filter,
            self.scope,
            self.cache.period()
        )
    }
}
