//! Runtime configuration
//!
//! Environment variables:
//! - `PORT` - HTTP server port (default: 8080)
//! - `RBAC_CACHE_TTL_MS` - Permission cache TTL in milliseconds, `0` disables caching (default: 300000)
//! - `RBAC_IDENTITY_FIELD` - `email` or `id` (default: email)
//! - `DATABASE_URL` - PostgreSQL connection string (optional)
//! - `RBAC_FIXTURE` - JSON snapshot used when no database is configured (optional)
//! - `RBAC_TABLE_ROLE`, `RBAC_TABLE_PERMISSION`, `RBAC_TABLE_INHERITANCE`, `RBAC_TABLE_USER`
//!   - table name overrides for the PostgreSQL store, restricted to `[A-Za-z0-9_]+`

use crate::error::ConfigError;
use crate::types::IdentityField;
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[cfg(feature = "postgres")]
use crate::storage::TableNames;

/// Default permission cache TTL (5 minutes)
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Engine and server configuration
#[derive(Debug, Clone)]
pub struct RbacConfig {
    /// HTTP server port
    pub port: u16,

    /// Permission cache TTL; `None` disables the cache
    pub cache_ttl: Option<Duration>,

    /// User field identities are matched against
    pub identity_field: IdentityField,

    /// PostgreSQL connection string
    pub database_url: Option<String>,

    /// JSON snapshot for the in-memory store
    pub fixture: Option<PathBuf>,

    /// PostgreSQL table names
    #[cfg(feature = "postgres")]
    pub tables: TableNames,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            cache_ttl: Some(DEFAULT_CACHE_TTL),
            identity_field: IdentityField::default(),
            database_url: None,
            fixture: None,
            #[cfg(feature = "postgres")]
            tables: TableNames::default(),
        }
    }
}

impl RbacConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(std::env::vars().collect())
    }

    /// Load configuration from an explicit variable map
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(port) = parse_var::<u16>(&vars, "PORT")? {
            config.port = port;
        }

        if let Some(ttl_ms) = parse_var::<u64>(&vars, "RBAC_CACHE_TTL_MS")? {
            config.cache_ttl = (ttl_ms > 0).then(|| Duration::from_millis(ttl_ms));
        }

        if let Some(field) = parse_var::<IdentityField>(&vars, "RBAC_IDENTITY_FIELD")? {
            config.identity_field = field;
        }

        config.database_url = non_empty(&vars, "DATABASE_URL");
        config.fixture = non_empty(&vars, "RBAC_FIXTURE").map(PathBuf::from);

        #[cfg(feature = "postgres")]
        {
            let tables = &mut config.tables;
            for (key, slot) in [
                ("RBAC_TABLE_ROLE", &mut tables.role),
                ("RBAC_TABLE_PERMISSION", &mut tables.permission),
                ("RBAC_TABLE_INHERITANCE", &mut tables.inheritance),
                ("RBAC_TABLE_USER", &mut tables.user),
            ] {
                if let Some(name) = non_empty(&vars, key) {
                    if !TableNames::is_valid_name(&name) {
                        return Err(ConfigError::InvalidValue {
                            key: key.to_string(),
                            value: name,
                        });
                    }
                    *slot = name;
                }
            }
        }

        Ok(config)
    }
}

fn non_empty(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_var<T: FromStr>(vars: &HashMap<String, String>, key: &str) -> Result<Option<T>, ConfigError> {
    match non_empty(vars, key) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}
