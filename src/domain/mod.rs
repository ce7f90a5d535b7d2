//! Domain layer - Core business logic and entities

pub mod account;
pub mod api_key;
pub mod cache;
pub mod error;
pub mod grants;
pub mod provisioning;

pub use account::{Account, AccountId};
pub use api_key::{
    ApiKey, ApiKeyId, ApiKeyRepository, ApiKeyType, ApiKeyValidationError, CredentialLookup,
    KeyCredentials, ValidationErrors,
};
pub use cache::{Cache, CacheFields};
pub use error::DomainError;
pub use grants::{Api, GrantSpec, PermissionSet, TablePermissions};
pub use provisioning::{PrivilegeCommand, RoleTableGrant, SqlExecutionError, SqlExecutor};
