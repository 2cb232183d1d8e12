use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

use crate::filter::is_valid_identifier;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid tenant role name: {0}")]
    InvalidRoleName(String),

    #[error("Invalid tenant session parameter: {0}")]
    InvalidParameterName(String),

    #[error("Invalid filter separator {name}: {value:?}")]
    InvalidSeparator { name: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub unit_of_work: UnitOfWorkConfig,
    pub filter: FilterConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    /// Replica used for read-only units of work; falls back to `url`
    pub read_only_url: Option<String>,
    /// Route every unit of work to the read-only pool
    pub force_read_only: bool,
    pub schema: Option<String>,
    pub application_name: String,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub tenant: TenantRoleConfig,
}

/// Roles and session parameter used for database-level tenant isolation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantRoleConfig {
    pub enabled: bool,
    pub role: String,
    pub role_ro: String,
    pub query_role_ro: String,
    pub parameter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitOfWorkConfig {
    pub autocommit: bool,
    /// When false, a successful nested scope exit commits immediately
    pub autocommit_ignore_nested: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub fields_separator: String,
    pub path_separator: String,
    pub max_limit: Option<i64>,
}

impl Default for TenantRoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            role: "tenant_user".to_string(),
            role_ro: "tenant_user_ro".to_string(),
            query_role_ro: "tenant_query_ro".to_string(),
            parameter: "app.current_organization_id".to_string(),
        }
    }
}

impl TenantRoleConfig {
    /// Role and parameter names are interpolated into `SET` statements, so
    /// they must be plain identifiers (dotted for the parameter).
    pub fn validate(&self) -> Result<(), ConfigError> {
        for role in [&self.role, &self.role_ro, &self.query_role_ro] {
            if !is_valid_identifier(role) {
                return Err(ConfigError::InvalidRoleName(role.clone()));
            }
        }
        if self.parameter.is_empty() || !self.parameter.split('.').all(is_valid_identifier) {
            return Err(ConfigError::InvalidParameterName(self.parameter.clone()));
        }
        Ok(())
    }
}

impl Default for UnitOfWorkConfig {
    fn default() -> Self {
        Self { autocommit: true, autocommit_ignore_nested: true }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            fields_separator: ":".to_string(),
            path_separator: "/".to_string(),
            max_limit: Some(1000),
        }
    }
}

impl FilterConfig {
    /// Separators must be non-empty and distinct, or every expression
    /// splits on the wrong boundary.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("FILTER_FIELDS_SEPARATOR", &self.fields_separator),
            ("FILTER_PATH_SEPARATOR", &self.path_separator),
        ] {
            if value.is_empty() {
                return Err(ConfigError::InvalidSeparator { name, value: value.clone() });
            }
        }
        if self.fields_separator == self.path_separator {
            return Err(ConfigError::InvalidSeparator {
                name: "FILTER_PATH_SEPARATOR",
                value: self.path_separator.clone(),
            });
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    fn with_env_overrides(mut self) -> Self {
        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_READ_ONLY_URL") {
            self.database.read_only_url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_FORCE_READ_ONLY") {
            self.database.force_read_only = v.parse().unwrap_or(self.database.force_read_only);
        }
        if let Ok(v) = env::var("DATABASE_SCHEMA") {
            self.database.schema = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("DATABASE_APPLICATION_NAME") {
            self.database.application_name = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Tenant isolation overrides
        if let Ok(v) = env::var("TENANT_ROLE_ENABLED") {
            self.database.tenant.enabled = v.parse().unwrap_or(self.database.tenant.enabled);
        }
        if let Ok(v) = env::var("TENANT_ROLE") {
            self.database.tenant.role = v;
        }
        if let Ok(v) = env::var("TENANT_ROLE_RO") {
            self.database.tenant.role_ro = v;
        }
        if let Ok(v) = env::var("TENANT_QUERY_ROLE_RO") {
            self.database.tenant.query_role_ro = v;
        }
        if let Ok(v) = env::var("TENANT_PARAMETER") {
            self.database.tenant.parameter = v;
        }

        // Unit of work overrides
        if let Ok(v) = env::var("SERVICES_AUTOCOMMIT") {
            self.unit_of_work.autocommit = v.parse().unwrap_or(self.unit_of_work.autocommit);
        }
        if let Ok(v) = env::var("SERVICES_AUTOCOMMIT_IGNORE_NESTED") {
            self.unit_of_work.autocommit_ignore_nested =
                v.parse().unwrap_or(self.unit_of_work.autocommit_ignore_nested);
        }

        // Filter overrides
        if let Ok(v) = env::var("FILTER_FIELDS_SEPARATOR") {
            self.filter.fields_separator = v;
        }
        if let Ok(v) = env::var("FILTER_PATH_SEPARATOR") {
            self.filter.path_separator = v;
        }
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: None,
                read_only_url: None,
                force_read_only: false,
                schema: None,
                application_name: "fury-api".to_string(),
                max_connections: 10,
                connection_timeout: 30,
                tenant: TenantRoleConfig::default(),
            },
            unit_of_work: UnitOfWorkConfig::default(),
            filter: FilterConfig::default(),
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.filter.max_limit = Some(500);
        config
    }

    fn production() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Production;
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config.filter.max_limit = Some(100);
        config
    }
}
