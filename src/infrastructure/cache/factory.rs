//! Cache factory for runtime selection

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::cache::Cache;
use crate::domain::DomainError;

use super::in_memory::{InMemoryCache, InMemoryCacheConfig};
use super::redis::{RedisCache, RedisCacheConfig};

/// Supported cache types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheType {
    /// In-memory cache using moka
    #[default]
    InMemory,
    /// Redis cache
    Redis,
}

impl std::fmt::Display for CacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheType::InMemory => write!(f, "in_memory"),
            CacheType::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for CacheType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(CacheType::InMemory),
            "redis" => Ok(CacheType::Redis),
            _ => Err(DomainError::configuration(format!(
                "Unknown cache type: {}. Valid types: in_memory, redis",
                s
            ))),
        }
    }
}

/// Configuration for cache factory
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Type of cache to create
    #[serde(rename = "backend")]
    pub cache_type: CacheType,
    /// Redis URL (required for Redis type)
    pub redis_url: Option<String>,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Maximum capacity (for in-memory cache)
    pub max_capacity: Option<u64>,
    /// Evict in-memory entries not read for this many seconds
    pub time_to_idle_secs: Option<u64>,
    /// Redis connection timeout in seconds
    pub connection_timeout_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: CacheType::InMemory,
            redis_url: None,
            key_prefix: None,
            max_capacity: Some(10_000),
            time_to_idle_secs: None,
            connection_timeout_secs: None,
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration for in-memory cache
    pub fn in_memory() -> Self {
        Self {
            cache_type: CacheType::InMemory,
            ..Default::default()
        }
    }

    /// Creates a new configuration for Redis cache
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            cache_type: CacheType::Redis,
            redis_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Sets the maximum capacity (in-memory only)
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }

    fn in_memory_config(&self) -> InMemoryCacheConfig {
        let mut config = InMemoryCacheConfig::default();

        if let Some(capacity) = self.max_capacity {
            config = config.with_max_capacity(capacity);
        }

        if let Some(secs) = self.time_to_idle_secs {
            config = config.with_time_to_idle(Duration::from_secs(secs));
        }

        config
    }

    fn redis_config(&self) -> Result<RedisCacheConfig, DomainError> {
        let url = self.redis_url.clone().ok_or_else(|| {
            DomainError::configuration("Redis URL is required for Redis cache type")
        })?;

        let mut config = RedisCacheConfig::new(url);

        if let Some(prefix) = &self.key_prefix {
            config = config.with_key_prefix(prefix.clone());
        }

        if let Some(secs) = self.connection_timeout_secs {
            config = config.with_connection_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

/// Factory for creating cache instances
#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    /// Creates a new cache factory
    pub fn new() -> Self {
        Self
    }

    /// Creates a cache instance based on configuration
    pub async fn create(&self, config: &CacheConfig) -> Result<Arc<dyn Cache>, DomainError> {
        match config.cache_type {
            CacheType::InMemory => Ok(Arc::new(InMemoryCache::with_config(
                config.in_memory_config(),
            ))),
            CacheType::Redis => {
                let cache = RedisCache::new(config.redis_config()?).await?;
                Ok(Arc::new(cache))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_type_from_str() {
        assert_eq!("in_memory".parse::<CacheType>().unwrap(), CacheType::InMemory);
        assert_eq!("memory".parse::<CacheType>().unwrap(), CacheType::InMemory);
        assert_eq!("REDIS".parse::<CacheType>().unwrap(), CacheType::Redis);
        assert!("memcached".parse::<CacheType>().is_err());
    }

    #[test]
    fn test_cache_config_redis() {
        let config = CacheConfig::redis("redis://localhost:6379").with_key_prefix("myapp");

        assert_eq!(config.cache_type, CacheType::Redis);
        assert_eq!(config.redis_url, Some("redis://localhost:6379".to_string()));
        assert_eq!(config.key_prefix, Some("myapp".to_string()));
    }

    #[test]
    fn test_cache_config_deserializes_backend() {
        let config: CacheConfig =
            serde_json::from_value(serde_json::json!({"backend": "redis", "redis_url": "redis://r"}))
                .unwrap();

        assert_eq!(config.cache_type, CacheType::Redis);
        assert_eq!(config.max_capacity, Some(10_000));
    }

    #[tokio::test]
    async fn test_factory_create_in_memory() {
        let factory = CacheFactory::new();
        let cache = factory.create(&CacheConfig::in_memory()).await.unwrap();

        cache
            .set_fields("k", &[("user".to_string(), "alice".to_string())])
            .await
            .unwrap();

        let stored = cache.get_fields("k").await.unwrap().unwrap();
        assert_eq!(stored.get("user"), Some(&"alice".to_string()));
    }

    #[tokio::test]
    async fn test_factory_create_redis_missing_url() {
        let factory = CacheFactory::new();
        let config = CacheConfig {
            cache_type: CacheType::Redis,
            redis_url: None,
            ..Default::default()
        };

        let result = factory.create(&config).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_timeouts_reach_backend_configs() {
        let config: CacheConfig = serde_json::from_value(serde_json::json!({
            "backend": "redis",
            "redis_url": "redis://r",
            "key_prefix": "keys",
            "time_to_idle_secs": 600,
            "connection_timeout_secs": 2
        }))
        .unwrap();

        let redis = config.redis_config().unwrap();
        assert_eq!(redis.url, "redis://r");
        assert_eq!(redis.key_prefix.as_deref(), Some("keys"));
        assert_eq!(redis.connection_timeout, Duration::from_secs(2));

        let in_memory = config.in_memory_config();
        assert_eq!(in_memory.max_capacity, 10_000);
        assert_eq!(in_memory.time_to_idle, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_cache_type_display() {
        assert_eq!(CacheType::InMemory.to_string(), "in_memory");
        assert_eq!(CacheType::Redis.to_string(), "redis");
    }
}
