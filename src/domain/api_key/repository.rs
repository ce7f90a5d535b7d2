//! API Key repository traits

use async_trait::async_trait;
use std::fmt::Debug;

use super::entity::{ApiKey, ApiKeyId, ApiKeyType};
use crate::domain::account::AccountId;
use crate::domain::DomainError;

/// Unique constraint names reported through [`DomainError::UniqueViolation`]
pub const TOKEN_CONSTRAINT: &str = "api_keys_token_key";
pub const DB_ROLE_CONSTRAINT: &str = "api_keys_db_role_key";
pub const OWNER_NAME_CONSTRAINT: &str = "api_keys_owner_name_key";
pub const OWNER_TYPE_CONSTRAINT: &str = "api_keys_owner_type_key";

/// Existence checks used while minting credentials
#[async_trait]
pub trait CredentialLookup: Send + Sync {
    /// Whether any key (of any owner) already holds this token
    async fn token_exists(&self, token: &str) -> Result<bool, DomainError>;

    /// Whether any key already holds this database role
    async fn db_role_exists(&self, db_role: &str) -> Result<bool, DomainError>;
}

/// Repository trait for API key storage.
///
/// Implementations must enforce, at write time, uniqueness of `token`,
/// `db_role`, `(owner, name)` and `(owner, type)` for non-regular keys,
/// failing with [`DomainError::UniqueViolation`] naming the constraint.
#[async_trait]
pub trait ApiKeyRepository: CredentialLookup + Debug {
    /// Get an API key by its ID
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError>;

    /// Get an API key by its token
    async fn get_by_token(&self, token: &str) -> Result<Option<ApiKey>, DomainError>;

    /// List the keys of one owner
    async fn list_by_owner(&self, owner_id: &AccountId) -> Result<Vec<ApiKey>, DomainError>;

    /// Persist a new API key
    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError>;

    /// Update an existing API key
    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError>;

    /// Delete an API key
    async fn delete(&self, id: &ApiKeyId) -> Result<bool, DomainError>;

    /// Whether the owner already has a key with this name
    async fn name_exists(&self, owner_id: &AccountId, name: &str) -> Result<bool, DomainError>;

    /// Whether the owner already has a key of this type
    async fn type_exists(
        &self,
        owner_id: &AccountId,
        key_type: ApiKeyType,
    ) -> Result<bool, DomainError>;
}
