//! In-memory directory used by the unit tests

use crate::client::{DirectoryClient, DirectoryConnection};
use crate::error::{DirectoryError, DirectoryResult};
use crate::manager::ServerDescriptor;
use crate::types::SearchResult;
use async_trait::async_trait;
use dirauth_core::SearchScope;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct MockState {
    results: HashMap<String, SearchResult>,
    passwords: HashMap<String, String>,
    fail_connect: bool,
    fail_search: bool,
    fail_ping: bool,
    connects: usize,
    searches: Vec<(String, String, SearchScope)>,
    binds: Vec<String>,
    unbinds: usize,
}

/// Directory keyed by filter string. Binds succeed when the password matches
/// the one registered for the DN, and also for any empty password, the way a
/// real server treats an unauthenticated bind.
#[derive(Clone, Default)]
pub(crate) struct MockDirectory {
    state: Arc<Mutex<MockState>>,
}

impl MockDirectory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_result(self, filter: &str, result: SearchResult) -> Self {
        self.state.lock().results.insert(filter.to_string(), result);
        self
    }

    pub(crate) fn with_password(self, dn: &str, password: &str) -> Self {
        self.state
            .lock()
            .passwords
            .insert(dn.to_string(), password.to_string());
        self
    }

    pub(crate) fn fail_connect(&self, fail: bool) {
        self.state.lock().fail_connect = fail;
    }

    pub(crate) fn fail_search(&self, fail: bool) {
        self.state.lock().fail_search = fail;
    }

    pub(crate) fn fail_ping(&self, fail: bool) {
        self.state.lock().fail_ping = fail;
    }

    pub(crate) fn connects(&self) -> usize {
        self.state.lock().connects
    }

    pub(crate) fn searches(&self) -> Vec<(String, String, SearchScope)> {
        self.state.lock().searches.clone()
    }

    pub(crate) fn binds(&self) -> Vec<String> {
        self.state.lock().binds.clone()
    }

    pub(crate) fn unbinds(&self) -> usize {
        self.state.lock().unbinds
    }

    /// Number of network round trips of any kind
    pub(crate) fn calls(&self) -> usize {
        let state = self.state.lock();
        state.connects + state.searches.len() + state.binds.len() + state.unbinds
    }
}

#[async_trait]
impl DirectoryClient for MockDirectory {
    async fn connect(
        &self,
        _server: &ServerDescriptor,
    ) -> DirectoryResult<Box<dyn DirectoryConnection>> {
        let mut state = self.state.lock();
        state.connects += 1;
        if state.fail_connect {
            return Err(DirectoryError::Transport("connection refused".into()));
        }
        Ok(Box::new(MockConnection {
            state: self.state.clone(),
        }))
    }
}

struct MockConnection {
    state: Arc<Mutex<MockState>>,
}

#[async_trait]
impl DirectoryConnection for MockConnection {
    async fn bind(&mut self, dn: &str, password: &str) -> DirectoryResult<()> {
        let mut state = self.state.lock();
        state.binds.push(dn.to_string());

        if password.is_empty() || state.passwords.get(dn).map(String::as_str) == Some(password) {
            Ok(())
        } else {
            Err(DirectoryError::Transport("invalidCredentials (49)".into()))
        }
    }

    async fn search(
        &mut self,
        base_dn: &str,
        scope: SearchScope,
        filter: &str,
    ) -> DirectoryResult<SearchResult> {
        let mut state = self.state.lock();
        state
            .searches
            .push((base_dn.to_string(), filter.to_string(), scope));

        if state.fail_search {
            return Err(DirectoryError::Transport("connection reset".into()));
        }
        Ok(state.results.get(filter).cloned().unwrap_or_default())
    }

    async fn ping(&mut self) -> DirectoryResult<()> {
        if self.state.lock().fail_ping {
            return Err(DirectoryError::Transport("connection closed by server".into()));
        }
        Ok(())
    }

    async fn unbind(&mut self) -> DirectoryResult<()> {
        self.state.lock().unbinds += 1;
        Ok(())
    }
}
