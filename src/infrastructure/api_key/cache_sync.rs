//! Cache projection of API keys
//!
//! Keeps the hash read by request authentication in step with persisted keys.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::domain::account::Account;
use crate::domain::api_key::ApiKey;
use crate::domain::cache::{Cache, CacheFields};
use crate::domain::DomainError;

/// Cache key under which a key's record lives
pub fn cache_key(owner_username: &str, token: &str) -> String {
    format!("api_keys:{}:{}", owner_username, token)
}

/// Flat field list stored for `key`
pub fn cache_fields(key: &ApiKey, owner: &Account) -> Result<CacheFields, DomainError> {
    let mut fields = vec![
        ("user".to_string(), owner.username().to_string()),
        ("type".to_string(), key.key_type().as_str().to_string()),
        ("database_role".to_string(), key.db_role().to_string()),
        ("database_password".to_string(), key.db_password().to_string()),
    ];

    for api in key.granted_apis()? {
        fields.push((format!("grants_{}", api), "true".to_string()));
    }

    Ok(fields)
}

/// Applies key changes to the cache after they are persisted
#[derive(Clone)]
pub struct CacheSync {
    cache: Arc<dyn Cache>,
}

impl fmt::Debug for CacheSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheSync").field("cache", &self.cache).finish()
    }
}

impl CacheSync {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    /// Publish `key` after a create or update.
    ///
    /// When the token changed, the entry under `previous_token` is removed
    /// before the new one is written.
    pub async fn on_saved(
        &self,
        key: &ApiKey,
        owner: &Account,
        previous_token: Option<&str>,
    ) -> Result<(), DomainError> {
        if let Some(previous) = previous_token.filter(|p| *p != key.token()) {
            let stale = cache_key(owner.username(), previous);
            debug!(api_key = %key.id(), "Removing cache entry for rotated token");
            self.cache.delete(&stale).await?;
        }

        let fields = cache_fields(key, owner)?;
        self.cache
            .set_fields(&cache_key(owner.username(), key.token()), &fields)
            .await?;

        debug!(api_key = %key.id(), "Published API key to cache");
        Ok(())
    }

    /// Remove the entry of a deleted key
    pub async fn on_deleted(&self, key: &ApiKey, owner: &Account) -> Result<(), DomainError> {
        self.cache
            .delete(&cache_key(owner.username(), key.token()))
            .await?;

        debug!(api_key = %key.id(), "Removed API key from cache");
        Ok(())
    }
}
