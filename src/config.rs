//! Service configuration.
//!
//! Settings come from `config/config.toml` (optional) overridden by
//! `CATEGORY_ODATA__<SECTION>__<KEY>` environment variables, e.g.
//! `CATEGORY_ODATA__DATABASE__URL`. The binary applies CLI flags on top and
//! then calls [`AppConfig::validate`] before opening any connection.

use crate::connection::validate_connection_string;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
const ENV_PREFIX: &str = "CATEGORY_ODATA";
/// Plain fallback for the connection string.
const FALLBACK_URL_VAR: &str = "DATABASE_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Required; there is no built-in default.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_pool_timeout_seconds")]
    pub pool_timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Worker threads for the coroutine scheduler; 0 keeps the runtime default.
    #[serde(default)]
    pub workers: usize,
    /// Coroutine stack size in bytes; 0 keeps the runtime default.
    #[serde(default = "default_stack_size")]
    pub stack_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedConfig {
    /// Rows inserted per call to the seed endpoint.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

fn default_max_connections() -> usize {
    10
}

fn default_pool_timeout_seconds() -> u64 {
    30
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_stack_size() -> usize {
    0x8000
}

fn default_batch_size() -> usize {
    crate::seed::DEFAULT_SEED_COUNT
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            pool_timeout_seconds: default_pool_timeout_seconds(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            workers: 0,
            stack_size: default_stack_size(),
        }
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

impl AppConfig {
    /// Load from `path` (optional file) and the environment.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        Self::build(builder, std::env::var(FALLBACK_URL_VAR).ok())
    }

    /// Deserialize `builder`, using `fallback_url` when no `database.url` is set.
    pub fn build(
        builder: ConfigBuilder<DefaultState>,
        fallback_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        let settings = builder.build()?;
        let mut config: AppConfig = settings.try_deserialize().map_err(|e| {
            ConfigError::Message(format!("Configuration could not be loaded from file or environment: {e}"))
        })?;

        if config.database.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            config.database.url = fallback_url.filter(|u| !u.trim().is_empty());
        }
        Ok(config)
    }

    /// The configured connection string.
    ///
    /// # Errors
    ///
    /// Fails when no url is configured anywhere.
    pub fn database_url(&self) -> Result<&str, ConfigError> {
        self.database.url.as_deref().ok_or_else(|| {
            ConfigError::Message(format!(
                "database.url is required: set it in {DEFAULT_CONFIG_PATH}, \
                 {ENV_PREFIX}__DATABASE__URL or {FALLBACK_URL_VAR}"
            ))
        })
    }

    /// Reject settings the service cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.database_url()?;
        validate_connection_string(url).map_err(|e| ConfigError::Message(format!("database.url: {e}")))?;

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Message("server.bind cannot be empty".to_string()));
        }
        if self.seed.batch_size == 0 {
            return Err(ConfigError::Message("seed.batch_size must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn from_toml(contents: &str, fallback: Option<&str>) -> Result<AppConfig, ConfigError> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let builder = Config::builder().add_source(File::from(file.path()));
        AppConfig::build(builder, fallback.map(str::to_string))
    }

    #[test]
    fn test_full_file() {
        let config = from_toml(
            r#"
            [database]
            url = "postgres://app:secret@db:5432/shop"
            max_connections = 4

            [server]
            bind = "127.0.0.1:9000"
            workers = 2
            stack_size = 0x10000

            [seed]
            batch_size = 25
            "#,
            None,
        )
        .unwrap();

        assert_eq!(config.database_url().unwrap(), "postgres://app:secret@db:5432/shop");
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.server.workers, 2);
        assert_eq!(config.server.stack_size, 0x10000);
        assert_eq!(config.seed.batch_size, 25);
        config.validate().unwrap();
    }

    #[test]
    fn test_defaults() {
        let config = from_toml("[database]\nurl = \"host=localhost user=postgres\"\n", None).unwrap();
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.database.pool_timeout_seconds, 30);
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.seed.batch_size, 100);
        config.validate().unwrap();
    }

    #[test]
    fn test_missing_url_fails_validation() {
        let config = from_toml("[server]\nbind = \"0.0.0.0:8080\"\n", None).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("database.url is required"));
    }

    #[test]
    fn test_fallback_url_used_when_unset() {
        let config = from_toml("", Some("postgres://u:p@localhost/db")).unwrap();
        assert_eq!(config.database_url().unwrap(), "postgres://u:p@localhost/db");

        let config = from_toml(
            "[database]\nurl = \"postgres://a:b@primary/db\"\n",
            Some("postgres://u:p@localhost/db"),
        )
        .unwrap();
        assert_eq!(config.database_url().unwrap(), "postgres://a:b@primary/db");
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let config = from_toml("[database]\nurl = \"not a url\"\n", None).unwrap();
        assert!(config.validate().is_err());

        let config = from_toml(
            "[database]\nurl = \"postgres://u:p@localhost/db\"\nmax_connections = 0\n",
            None,
        )
        .unwrap();
        assert!(config
            .validate()
            .unwrap_err()
            .to_string()
            .contains("max_connections"));
    }

    #[test]
    fn test_zero_seed_batch_rejected() {
        let config = from_toml(
            "[database]\nurl = \"postgres://u:p@localhost/db\"\n[seed]\nbatch_size = 0\n",
            None,
        )
        .unwrap();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("seed.batch_size"), "{err}");

        let config = from_toml(
            "[database]\nurl = \"postgres://u:p@localhost/db\"\n[seed]\nbatch_size = 1\n",
            None,
        )
        .unwrap();
        assert!(config.validate().is_ok());
    }
}
