use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

/// Development-only signing secret, used when `SESSION_SECRET` is unset outside production.
const DEV_SESSION_SECRET: &str = "portal-dev-session-secret";

/// Suffix of the per-pool connection string variables (`CORE_DB_URL`, `GTP_PROXY_DB_URL`).
pub const POOL_URL_SUFFIX: &str = "_DB_URL";

/// Upper bounds keep derived timestamps inside chrono's range.
pub const MAX_RETENTION_DAYS: i64 = 36_500;
pub const MAX_SESSION_EXPIRY_HOURS: u64 = 24 * 366;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub auth: AuthConfig,
    pub audit: AuditConfig,
    pub schema_dir: Option<PathBuf>,
    /// Connection strings by pool name, captured once at startup.
    #[serde(skip_serializing, default)]
    pub pool_urls: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub max_connections: u32,
    /// Pool acquire timeout in seconds.
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// Built-in development users; the service issues its own session tokens.
    Credentials,
    /// Sessions come only from the identity provider; local login is disabled.
    Keycloak,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeycloakConfig {
    pub issuer: String,
    pub client_id: String,
    #[serde(skip_serializing, default)]
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    #[serde(skip_serializing, default)]
    pub session_secret: Option<String>,
    pub session_expiry_hours: u64,
    pub keycloak: Option<KeycloakConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionMode {
    /// Prune after every audit insert.
    Inline,
    /// Prune from a background task on a fixed interval.
    Scheduled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub retention_days: i64,
    pub mode: RetentionMode,
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_vars(env::vars())
    }

    /// Builds the configuration from an explicit variable set.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

        let environment = match vars.get("APP_ENV").map(String::as_str) {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(&vars)
    }

    fn with_overrides(mut self, vars: &HashMap<String, String>) -> Self {
        let get = |name: &str| vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty());

        // Database overrides
        if let Some(v) = get("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = get("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // API overrides
        if let Some(v) = get("PORTAL_API_PORT").or_else(|| get("PORT")) {
            self.api.port = v.parse().unwrap_or(self.api.port);
        }
        if let Some(v) = get("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Some(v) = get("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Auth overrides
        if let Some(v) = get("AUTH_MODE") {
            self.auth.mode = match v.to_ascii_lowercase().as_str() {
                "keycloak" => AuthMode::Keycloak,
                _ => AuthMode::Credentials,
            };
        }
        if let Some(v) = get("SESSION_SECRET") {
            self.auth.session_secret = Some(v.to_string());
        }
        if let Some(v) = get("SESSION_EXPIRY_HOURS") {
            self.auth.session_expiry_hours = v.parse().unwrap_or(self.auth.session_expiry_hours);
        }
        if let (Some(issuer), Some(client_id), Some(client_secret)) =
            (get("KEYCLOAK_ISSUER"), get("KEYCLOAK_ID"), get("KEYCLOAK_SECRET"))
        {
            self.auth.keycloak = Some(KeycloakConfig {
                issuer: issuer.to_string(),
                client_id: client_id.to_string(),
                client_secret: client_secret.to_string(),
            });
        }

        // Audit overrides
        if let Some(v) = get("AUDIT_RETENTION_DAYS") {
            self.audit.retention_days = v.parse().unwrap_or(self.audit.retention_days);
        }
        if let Some(v) = get("AUDIT_RETENTION_MODE") {
            self.audit.mode = match v.to_ascii_lowercase().as_str() {
                "inline" => RetentionMode::Inline,
                _ => RetentionMode::Scheduled,
            };
        }
        if let Some(v) = get("AUDIT_SWEEP_INTERVAL_SECS") {
            self.audit.sweep_interval_secs = v.parse().unwrap_or(self.audit.sweep_interval_secs);
        }

        if let Some(v) = get("PORTAL_SCHEMA_DIR") {
            self.schema_dir = Some(PathBuf::from(v));
        }

        for (name, value) in vars {
            let Some(pool) = name.strip_suffix(POOL_URL_SUFFIX) else { continue };
            if is_pool_name(pool) && !value.trim().is_empty() {
                self.pool_urls.insert(pool.to_string(), value.trim().to_string());
            }
        }

        self
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Connection string for a named pool, if one was configured.
    pub fn pool_url(&self, pool: &str) -> Option<&str> {
        self.pool_urls.get(pool).map(String::as_str)
    }

    /// Secret used to sign and verify session tokens.
    pub fn session_secret(&self) -> Option<&str> {
        match self.auth.mode {
            AuthMode::Keycloak => self.auth.keycloak.as_ref().map(|k| k.client_secret.as_str()),
            AuthMode::Credentials => match &self.auth.session_secret {
                Some(secret) => Some(secret.as_str()),
                None if !self.is_production() => Some(DEV_SESSION_SECRET),
                None => None,
            },
        }
    }

    /// Checks settings the server cannot start without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.auth.mode {
            AuthMode::Credentials if self.session_secret().is_none() => {
                return Err(ConfigError::Missing("SESSION_SECRET"));
            }
            AuthMode::Keycloak if self.auth.keycloak.is_none() => {
                return Err(ConfigError::Missing("KEYCLOAK_ISSUER, KEYCLOAK_ID and KEYCLOAK_SECRET"));
            }
            _ => {}
        }
        if self.auth.session_expiry_hours == 0 || self.auth.session_expiry_hours > MAX_SESSION_EXPIRY_HOURS {
            return Err(ConfigError::Invalid {
                name: "SESSION_EXPIRY_HOURS",
                value: self.auth.session_expiry_hours.to_string(),
            });
        }
        if self.audit.retention_days <= 0 || self.audit.retention_days > MAX_RETENTION_DAYS {
            return Err(ConfigError::Invalid {
                name: "AUDIT_RETENTION_DAYS",
                value: self.audit.retention_days.to_string(),
            });
        }
        if self.audit.mode == RetentionMode::Scheduled && self.audit.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid { name: "AUDIT_SWEEP_INTERVAL_SECS", value: "0".to_string() });
        }
        Ok(())
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig { max_connections: 10, connection_timeout: 30 },
            api: ApiConfig {
                port: 9001,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
            },
            security: SecurityConfig {
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            auth: AuthConfig {
                mode: AuthMode::Credentials,
                session_secret: None,
                session_expiry_hours: 24 * 7, // 1 week
                keycloak: None,
            },
            audit: AuditConfig::default(),
            schema_dir: None,
            pool_urls: BTreeMap::new(),
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            database: DatabaseConfig { max_connections: 20, connection_timeout: 10 },
            api: ApiConfig {
                port: 9001,
                max_request_size_bytes: 5 * 1024 * 1024, // 5MB
            },
            security: SecurityConfig { cors_origins: vec!["https://staging.example.com".to_string()] },
            auth: AuthConfig {
                mode: AuthMode::Credentials,
                session_secret: None,
                session_expiry_hours: 24,
                keycloak: None,
            },
            audit: AuditConfig::default(),
            schema_dir: None,
            pool_urls: BTreeMap::new(),
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            database: DatabaseConfig { max_connections: 50, connection_timeout: 5 },
            api: ApiConfig {
                port: 9001,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig { cors_origins: vec!["https://app.example.com".to_string()] },
            auth: AuthConfig {
                mode: AuthMode::Credentials,
                session_secret: None,
                session_expiry_hours: 4,
                keycloak: None,
            },
            audit: AuditConfig::default(),
            schema_dir: None,
            pool_urls: BTreeMap::new(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { retention_days: 7, mode: RetentionMode::Scheduled, sweep_interval_secs: 3600 }
    }
}

/// Pool names are upper-case identifiers (`CORE`, `GTP_PROXY`).
pub fn is_pool_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::from_vars(Vec::<(String, String)>::new());
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.audit.retention_days, 7);
        assert_eq!(config.audit.mode, RetentionMode::Scheduled);
        assert_eq!(config.session_secret(), Some(DEV_SESSION_SECRET));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_requires_session_secret() {
        let config = AppConfig::from_vars([("APP_ENV", "production")]);
        assert!(config.is_production());
        assert!(matches!(config.validate(), Err(ConfigError::Missing("SESSION_SECRET"))));

        let config = AppConfig::from_vars([("APP_ENV", "production"), ("SESSION_SECRET", "s3cret")]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_durations_are_rejected() {
        let config = AppConfig::from_vars([("AUDIT_RETENTION_DAYS", "200000000000000")]);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { name: "AUDIT_RETENTION_DAYS", .. })));

        let config = AppConfig::from_vars([("SESSION_EXPIRY_HOURS", "1000000000000")]);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { name: "SESSION_EXPIRY_HOURS", .. })));

        let config = AppConfig::from_vars([("SESSION_EXPIRY_HOURS", "0")]);
        assert!(config.validate().is_err());

        let config = AppConfig::from_vars([("AUDIT_RETENTION_DAYS", "30"), ("SESSION_EXPIRY_HOURS", "12")]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_urls_are_captured() {
        let config = AppConfig::from_vars([
            ("CORE_DB_URL", "postgres://h/core"),
            ("GTP_PROXY_DB_URL", "postgres://h/gtp"),
            ("EMPTY_DB_URL", "  "),
            ("lower_DB_URL", "postgres://h/x"),
            ("DATABASE_URL", "postgres://h/other"),
        ]);
        assert_eq!(config.pool_url("CORE"), Some("postgres://h/core"));
        assert_eq!(config.pool_url("GTP_PROXY"), Some("postgres://h/gtp"));
        assert_eq!(config.pool_url("EMPTY"), None);
        assert_eq!(config.pool_urls.len(), 2);
    }

    #[test]
    fn test_keycloak_mode_uses_client_secret() {
        let config = AppConfig::from_vars([("AUTH_MODE", "keycloak")]);
        assert!(config.validate().is_err());

        let config = AppConfig::from_vars([
            ("AUTH_MODE", "keycloak"),
            ("KEYCLOAK_ISSUER", "https://sso.example.com/realms/portal"),
            ("KEYCLOAK_ID", "portal"),
            ("KEYCLOAK_SECRET", "kc-secret"),
        ]);
        assert!(config.validate().is_ok());
        assert_eq!(config.session_secret(), Some("kc-secret"));
    }

    #[test]
    fn test_audit_overrides() {
        let config = AppConfig::from_vars([
            ("AUDIT_RETENTION_DAYS", "3"),
            ("AUDIT_RETENTION_MODE", "inline"),
            ("AUDIT_SWEEP_INTERVAL_SECS", "not-a-number"),
        ]);
        assert_eq!(config.audit.retention_days, 3);
        assert_eq!(config.audit.mode, RetentionMode::Inline);
        assert_eq!(config.audit.sweep_interval_secs, 3600);
    }
}
