//! Error types for the permission resolution engine

use crate::storage::StorageError;
use thiserror::Error;

/// Authorization engine errors
///
/// Missing or inactive roles and users are not errors: they resolve to an
/// empty permission set. Only identity failures, denied checks and storage
/// failures surface here.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// No caller identity could be established
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Caller is known but the action/resource check failed
    #[error("Forbidden: {action} on {resource}")]
    Forbidden {
        /// Action that was checked
        action: String,
        /// Resource that was checked
        resource: String,
    },

    /// Storage collaborator failure, passed through untouched
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    /// HTTP status code a host should answer with for this error
    pub fn status_code(&self) -> u16 {
        match self {
            AuthzError::Unauthenticated(_) => 401,
            AuthzError::Forbidden { .. } => 403,
            AuthzError::InvalidInput(_) => 400,
            _ => 500,
        }
    }

    /// Shorthand for a failed action/resource check
    pub fn forbidden(action: impl Into<String>, resource: impl Into<String>) -> Self {
        AuthzError::Forbidden {
            action: action.into(),
            resource: resource.into(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// Environment variable present but unparsable
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name
        key: String,
        /// Raw value that failed to parse
        value: String,
    },
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
