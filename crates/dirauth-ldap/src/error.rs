//! Directory error types

use thiserror::Error;

/// Result type for directory operations
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Directory-related errors
///
/// An invalid login is not an error: it is reported as `Ok(None)` by the
/// connector so callers cannot tell which factor failed.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Invalid directory URI: {0}")]
    InvalidUri(String),

    #[error("Refusing unauthenticated bind for {0}")]
    UnauthenticatedBind(String),

    #[error("LDAP error: {0}")]
    Ldap(#[from] ldap3::LdapError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error(transparent)]
    Core(#[from] dirauth_core::Error),
}

impl DirectoryError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        DirectoryError::Configuration(message.into())
    }

    /// True for failures raised while talking to the directory, as opposed
    /// to setup defects.
    pub fn is_directory_failure(&self) -> bool {
        matches!(
            self,
            DirectoryError::Ldap(_)
                | DirectoryError::Transport(_)
                | DirectoryError::Pool(_)
                | DirectoryError::UnauthenticatedBind(_)
        )
    }
}
