//! Infrastructure layer - adapters for storage, cache, SQL execution and logging

pub mod api_key;
pub mod cache;
pub mod logging;
pub mod provisioning;

pub use api_key::{
    ApiKeyService, ApiKeySettings, CacheSync, CredentialGenerator, InMemoryApiKeyRepository,
    PostgresApiKeyRepository,
};
pub use cache::{CacheConfig, CacheFactory, CacheType, InMemoryCache, RedisCache};
pub use logging::init_logging;
pub use provisioning::{DryRunSqlExecutor, PostgresConfig, PostgresSqlExecutor, RoleProvisioner};
