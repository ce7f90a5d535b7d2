//! Redis cache implementation

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};

use crate::domain::cache::Cache;
use crate::domain::DomainError;

/// Configuration for Redis cache
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Connection timeout
    pub connection_timeout: Duration,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisCacheConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Sets the connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    fn prefix_key(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }
}

/// Redis cache implementation
///
/// Each entry is a Redis hash written with HSET and read with HGETALL.
/// Entries carry no TTL; they live until the key is deleted or rotated.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCache {
    /// Creates a new Redis cache connection
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        let manager_config =
            ConnectionManagerConfig::new().set_connection_timeout(config.connection_timeout);

        let connection = ConnectionManager::new_with_config(client, manager_config)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection, config })
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn set_fields(&self, key: &str, fields: &[(String, String)]) -> Result<(), DomainError> {
        if fields.is_empty() {
            return Ok(());
        }

        let prefixed_key = self.config.prefix_key(key);
        let mut conn = self.connection.clone();

        let _: () = conn
            .hset_multiple(&prefixed_key, fields)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to set key '{}': {}", key, e)))?;

        Ok(())
    }

    async fn get_fields(&self, key: &str) -> Result<Option<HashMap<String, String>>, DomainError> {
        let prefixed_key = self.config.prefix_key(key);
        let mut conn = self.connection.clone();

        let fields: HashMap<String, String> = conn
            .hgetall(&prefixed_key)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to get key '{}': {}", key, e)))?;

        // HGETALL answers a missing key with an empty hash
        if fields.is_empty() {
            Ok(None)
        } else {
            Ok(Some(fields))
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let prefixed_key = self.config.prefix_key(key);
        let mut conn = self.connection.clone();

        let deleted: i32 = conn.del(&prefixed_key).await.map_err(|e| {
            DomainError::cache(format!("Failed to delete key '{}': {}", key, e))
        })?;

        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        let prefixed_key = self.config.prefix_key(key);
        let mut conn = self.connection.clone();

        let exists: bool = conn.exists(&prefixed_key).await.map_err(|e| {
            DomainError::cache(format!("Failed to check existence of key '{}': {}", key, e))
        })?;

        Ok(exists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: these tests require a running Redis instance

    fn get_test_config() -> RedisCacheConfig {
        RedisCacheConfig::new("redis://127.0.0.1:6379").with_key_prefix("test")
    }

    fn fields() -> Vec<(String, String)> {
        vec![
            ("user".to_string(), "alice".to_string()),
            ("grants_sql".to_string(), "true".to_string()),
        ]
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_set_and_get_fields() {
        let cache = RedisCache::new(get_test_config()).await.unwrap();

        cache.set_fields("api_keys:alice:tok", &fields()).await.unwrap();

        let stored = cache.get_fields("api_keys:alice:tok").await.unwrap().unwrap();
        assert_eq!(stored.get("user"), Some(&"alice".to_string()));
        assert_eq!(stored.get("grants_sql"), Some(&"true".to_string()));

        // Cleanup
        cache.delete("api_keys:alice:tok").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_delete() {
        let cache = RedisCache::new(get_test_config()).await.unwrap();

        cache.set_fields("api_keys:alice:tok", &fields()).await.unwrap();

        assert!(cache.delete("api_keys:alice:tok").await.unwrap());
        assert!(cache.get_fields("api_keys:alice:tok").await.unwrap().is_none());
        assert!(!cache.exists("api_keys:alice:tok").await.unwrap());
    }

    #[test]
    fn test_key_prefix() {
        let config = RedisCacheConfig::new("redis://localhost").with_key_prefix("myapp");
        assert_eq!(config.prefix_key("api_keys:a:t"), "myapp:api_keys:a:t");

        let config = RedisCacheConfig::new("redis://localhost");
        assert_eq!(config.prefix_key("api_keys:a:t"), "api_keys:a:t");
    }
}
