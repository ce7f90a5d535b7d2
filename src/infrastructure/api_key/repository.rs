//! In-memory API key repository implementation

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::account::AccountId;
use crate::domain::api_key::{
    ApiKey, ApiKeyId, ApiKeyRepository, ApiKeyType, CredentialLookup, DB_ROLE_CONSTRAINT,
    OWNER_NAME_CONSTRAINT, OWNER_TYPE_CONSTRAINT, TOKEN_CONSTRAINT,
};
use crate::domain::DomainError;

/// In-memory implementation of ApiKeyRepository
///
/// Enforces the same unique constraints as the PostgreSQL table.
#[derive(Debug, Default)]
pub struct InMemoryApiKeyRepository {
    keys: Arc<RwLock<HashMap<ApiKeyId, ApiKey>>>,
}

impl InMemoryApiKeyRepository {
    /// Create a new in-memory repository
    pub fn new() -> Self {
        Self::default()
    }
}

/// Name of the first constraint `candidate` would violate against `keys`.
///
/// Default public keys share a well-known token and the public role, and
/// master keys reuse the owner's role, so token uniqueness skips default
/// public keys and role uniqueness only covers regular keys.
fn violated_constraint(
    keys: &HashMap<ApiKeyId, ApiKey>,
    candidate: &ApiKey,
) -> Option<&'static str> {
    let others = keys.values().filter(|k| k.id() != candidate.id());

    for other in others {
        let shared_token = other.is_default_public() || candidate.is_default_public();
        if !shared_token && other.token() == candidate.token() {
            return Some(TOKEN_CONSTRAINT);
        }

        let dedicated_roles = other.is_regular() && candidate.is_regular();
        if dedicated_roles && other.db_role() == candidate.db_role() {
            return Some(DB_ROLE_CONSTRAINT);
        }

        if other.owner_id() != candidate.owner_id() {
            continue;
        }

        if other.name() == candidate.name() {
            return Some(OWNER_NAME_CONSTRAINT);
        }

        if !candidate.is_regular() && other.key_type() == candidate.key_type() {
            return Some(OWNER_TYPE_CONSTRAINT);
        }
    }

    None
}

#[async_trait]
impl CredentialLookup for InMemoryApiKeyRepository {
    async fn token_exists(&self, token: &str) -> Result<bool, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.values().any(|k| k.token() == token))
    }

    async fn db_role_exists(&self, db_role: &str) -> Result<bool, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.values().any(|k| k.db_role() == db_role))
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.get(id).cloned())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<ApiKey>, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys.values().find(|k| k.token() == token).cloned())
    }

    async fn list_by_owner(&self, owner_id: &AccountId) -> Result<Vec<ApiKey>, DomainError> {
        let keys = self.keys.read().await;

        let mut result: Vec<ApiKey> = keys
            .values()
            .filter(|k| k.owner_id() == owner_id)
            .cloned()
            .collect();
        result.sort_by_key(|k| k.created_at());

        Ok(result)
    }

    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        let mut keys = self.keys.write().await;

        if keys.contains_key(api_key.id()) {
            return Err(DomainError::unique_violation("api_keys_pkey"));
        }

        if let Some(constraint) = violated_constraint(&keys, &api_key) {
            return Err(DomainError::unique_violation(constraint));
        }

        keys.insert(*api_key.id(), api_key.clone());
        Ok(api_key)
    }

    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError> {
        let mut keys = self.keys.write().await;

        if !keys.contains_key(api_key.id()) {
            return Err(DomainError::not_found(format!(
                "API key '{}' not found",
                api_key.id()
            )));
        }

        if let Some(constraint) = violated_constraint(&keys, api_key) {
            return Err(DomainError::unique_violation(constraint));
        }

        keys.insert(*api_key.id(), api_key.clone());
        Ok(api_key.clone())
    }

    async fn delete(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
        let mut keys = self.keys.write().await;
        Ok(keys.remove(id).is_some())
    }

    async fn name_exists(&self, owner_id: &AccountId, name: &str) -> Result<bool, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys
            .values()
            .any(|k| k.owner_id() == owner_id && k.name() == name))
    }

    async fn type_exists(
        &self,
        owner_id: &AccountId,
        key_type: ApiKeyType,
    ) -> Result<bool, DomainError> {
        let keys = self.keys.read().await;
        Ok(keys
            .values()
            .any(|k| k.owner_id() == owner_id && k.key_type() == key_type))
    }
}
