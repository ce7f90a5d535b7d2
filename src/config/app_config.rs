use serde::Deserialize;

use crate::infrastructure::api_key::{ApiKeySettings, CredentialGenerator};
use crate::infrastructure::cache::CacheConfig;
use crate::infrastructure::provisioning::PostgresConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL; the role must be allowed to create and drop roles
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    /// Password of the shared public database user
    pub public_db_password: String,
    pub token_bytes: usize,
    pub password_bytes: usize,
    /// Collision retries for tokens and role names
    pub max_attempts: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let postgres = PostgresConfig::default();

        Self {
            url: postgres.url,
            max_connections: postgres.max_connections,
            min_connections: postgres.min_connections,
            connect_timeout_secs: postgres.connect_timeout_secs,
        }
    }
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            public_db_password: ApiKeySettings::default().public_db_password,
            token_bytes: 32,
            password_bytes: 20,
            max_attempts: 10,
        }
    }
}

impl DatabaseConfig {
    pub fn postgres(&self) -> PostgresConfig {
        PostgresConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout_secs: self.connect_timeout_secs,
        }
    }
}

impl CredentialsConfig {
    pub fn generator(&self) -> CredentialGenerator {
        CredentialGenerator::new()
            .with_token_bytes(self.token_bytes)
            .with_password_bytes(self.password_bytes)
            .with_max_attempts(self.max_attempts)
    }

    pub fn settings(&self) -> ApiKeySettings {
        ApiKeySettings {
            public_db_password: self.public_db_password.clone(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
