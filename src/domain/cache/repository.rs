//! Cache trait definition

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

/// Flat field/value record stored under one cache key
pub type CacheFields = Vec<(String, String)>;

/// Hash-map style cache: each key holds a set of string fields.
///
/// Mirrors the subset of Redis hash commands the key cache needs.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Sets the given fields on the hash stored at `key`
    async fn set_fields(&self, key: &str, fields: &[(String, String)]) -> Result<(), DomainError>;

    /// Gets every field of the hash stored at `key`
    async fn get_fields(&self, key: &str) -> Result<Option<HashMap<String, String>>, DomainError>;

    /// Deletes the entry at `key`
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Checks if a key exists in the cache
    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.get_fields(key).await?.is_some())
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Operation recorded by [`MockCache`]
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum CacheOp {
        Set(String),
        Delete(String),
    }

    /// Mock cache for testing
    #[derive(Debug, Default)]
    pub struct MockCache {
        entries: Mutex<HashMap<String, HashMap<String, String>>>,
        ops: Mutex<Vec<CacheOp>>,
        error: Mutex<Option<String>>,
    }

    impl MockCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_error(self, error: impl Into<String>) -> Self {
            *self.error.lock().unwrap() = Some(error.into());
            self
        }

        pub fn ops(&self) -> Vec<CacheOp> {
            self.ops.lock().unwrap().clone()
        }

        pub fn keys(&self) -> Vec<String> {
            self.entries.lock().unwrap().keys().cloned().collect()
        }

        fn check_error(&self) -> Result<(), DomainError> {
            if let Some(error) = self.error.lock().unwrap().clone() {
                return Err(DomainError::cache(error));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Cache for MockCache {
        async fn set_fields(
            &self,
            key: &str,
            fields: &[(String, String)],
        ) -> Result<(), DomainError> {
            self.check_error()?;
            self.ops.lock().unwrap().push(CacheOp::Set(key.to_string()));

            let mut entries = self.entries.lock().unwrap();
            let entry = entries.entry(key.to_string()).or_default();

            for (field, value) in fields {
                entry.insert(field.clone(), value.clone());
            }

            Ok(())
        }

        async fn get_fields(
            &self,
            key: &str,
        ) -> Result<Option<HashMap<String, String>>, DomainError> {
            self.check_error()?;
            Ok(self.entries.lock().unwrap().get(key).cloned())
        }

        async fn delete(&self, key: &str) -> Result<bool, DomainError> {
            self.check_error()?;
            self.ops.lock().unwrap().push(CacheOp::Delete(key.to_string()));
            Ok(self.entries.lock().unwrap().remove(key).is_some())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn fields(pairs: &[(&str, &str)]) -> CacheFields {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        }

        #[tokio::test]
        async fn test_mock_cache_set_get() {
            let cache = MockCache::new();
            cache
                .set_fields("k", &fields(&[("user", "alice")]))
                .await
                .unwrap();

            let stored = cache.get_fields("k").await.unwrap().unwrap();
            assert_eq!(stored.get("user").map(String::as_str), Some("alice"));
            assert!(cache.exists("k").await.unwrap());
        }

        #[tokio::test]
        async fn test_mock_cache_delete() {
            let cache = MockCache::new();
            cache.set_fields("k", &fields(&[("a", "1")])).await.unwrap();

            assert!(cache.delete("k").await.unwrap());
            assert!(!cache.delete("k").await.unwrap());
            assert_eq!(
                cache.ops(),
                vec![
                    CacheOp::Set("k".to_string()),
                    CacheOp::Delete("k".to_string()),
                    CacheOp::Delete("k".to_string()),
                ]
            );
        }

        #[tokio::test]
        async fn test_mock_cache_with_error() {
            let cache = MockCache::new().with_error("down");
            assert!(cache.get_fields("k").await.is_err());
        }
    }
}
