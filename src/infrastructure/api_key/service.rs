//! API Key service
//!
//! Provides the lifecycle operations for API keys: creation of the three key
//! types, token rotation, deletion and role reprovisioning.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, info, warn};

use crate::domain::account::Account;
use crate::domain::api_key::{
    validate_new_api_key, ApiKey, ApiKeyId, ApiKeyRepository, ApiKeyType, ApiKeyValidationError,
    KeyCredentials, NewApiKey, UniquenessCheck, DB_ROLE_CONSTRAINT, NAME_DEFAULT_PUBLIC,
    NAME_MASTER, OWNER_NAME_CONSTRAINT, OWNER_TYPE_CONSTRAINT, TAKEN_MESSAGE, TOKEN_CONSTRAINT,
    TOKEN_DEFAULT_PUBLIC,
};
use crate::domain::grants::{GrantSpec, TablePermissions};
use crate::domain::DomainError;
use crate::infrastructure::provisioning::RoleProvisioner;

use super::cache_sync::CacheSync;
use super::generator::CredentialGenerator;

/// Service-level settings
#[derive(Debug, Clone)]
pub struct ApiKeySettings {
    /// Password shared by every account's public database user
    pub public_db_password: String,
}

impl Default for ApiKeySettings {
    fn default() -> Self {
        Self {
            public_db_password: "publicuser".to_string(),
        }
    }
}

/// API Key service for managing API keys
#[derive(Debug)]
pub struct ApiKeyService<R>
where
    R: ApiKeyRepository,
{
    repository: Arc<R>,
    generator: CredentialGenerator,
    provisioner: RoleProvisioner,
    cache_sync: CacheSync,
    settings: ApiKeySettings,
}

impl<R: ApiKeyRepository> ApiKeyService<R> {
    /// Create a new API key service
    pub fn new(repository: Arc<R>, provisioner: RoleProvisioner, cache_sync: CacheSync) -> Self {
        Self {
            repository,
            generator: CredentialGenerator::default(),
            provisioner,
            cache_sync,
            settings: ApiKeySettings::default(),
        }
    }

    /// Create with a custom credential generator
    pub fn with_generator(mut self, generator: CredentialGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_settings(mut self, settings: ApiKeySettings) -> Self {
        self.settings = settings;
        self
    }

    /// Create the owner's master key
    pub async fn create_master_key(&self, owner: &Account) -> Result<ApiKey, DomainError> {
        self.create_key(owner, ApiKeyType::Master, NAME_MASTER, &GrantSpec::all_apis().to_value())
            .await
    }

    /// Create the owner's default public key
    pub async fn create_default_public_key(&self, owner: &Account) -> Result<ApiKey, DomainError> {
        self.create_key(
            owner,
            ApiKeyType::DefaultPublic,
            NAME_DEFAULT_PUBLIC,
            &GrantSpec::all_apis().to_value(),
        )
        .await
    }

    /// Create a regular key and provision its database role
    pub async fn create_regular_key(
        &self,
        owner: &Account,
        name: &str,
        grants: &Value,
    ) -> Result<ApiKey, DomainError> {
        self.create_key(owner, ApiKeyType::Regular, name, grants).await
    }

    /// Get an API key by ID
    pub async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        self.repository.get(id).await
    }

    /// Get an API key by its token
    pub async fn get_by_token(&self, token: &str) -> Result<Option<ApiKey>, DomainError> {
        self.repository.get_by_token(token).await
    }

    /// List the keys of an account
    pub async fn list_for_owner(&self, owner: &Account) -> Result<Vec<ApiKey>, DomainError> {
        self.repository.list_by_owner(owner.id()).await
    }

    /// Replace a key's token and move its cache entry
    pub async fn regenerate_token(
        &self,
        id: &ApiKeyId,
        owner: &Account,
    ) -> Result<ApiKey, DomainError> {
        let mut key = self.owned_key(id, owner).await?;

        if key.is_default_public() {
            return Err(DomainError::forbidden(
                "The default public key uses a well-known token",
            ));
        }

        info!("Regenerating token for API key: id={}", id);

        let previous = key.token().to_string();

        for attempt in 1..=self.generator.max_attempts() {
            let token = self.generator.unique_token(self.repository.as_ref()).await?;
            key.rotate_token(token);

            match self.repository.update(&key).await {
                Ok(updated) => {
                    self.cache_sync.on_saved(&updated, owner, Some(&previous)).await?;
                    info!("Token regenerated for API key: id={}", id);
                    return Ok(updated);
                }
                Err(DomainError::UniqueViolation { constraint }) if constraint == TOKEN_CONSTRAINT => {
                    warn!(attempt, "Token collision on update, retrying");
                }
                Err(e) => return Err(e),
            }
        }

        Err(DomainError::internal(format!(
            "Could not store a unique token after {} attempts",
            self.generator.max_attempts()
        )))
    }

    /// Delete a regular key: tear down its role, then remove the record and
    /// its cache entry.
    ///
    /// A failed teardown keeps the record so the delete can be retried.
    pub async fn delete(&self, id: &ApiKeyId, owner: &Account) -> Result<(), DomainError> {
        let key = self.owned_key(id, owner).await?;

        if !key.can_be_deleted() {
            return Err(DomainError::forbidden(format!(
                "{} API keys cannot be deleted",
                key.key_type().description()
            )));
        }

        info!("Deleting API key: id={}", id);

        if let Err(e) = self
            .provisioner
            .deprovision(key.db_role(), &key.affected_schemas())
            .await
        {
            error!(
                api_key = %id,
                role = %key.db_role(),
                "Database role could not be dropped, keeping API key: {}", e
            );
            return Err(e);
        }

        if !self.repository.delete(id).await? {
            return Err(DomainError::not_found(format!("API key '{}' not found", id)));
        }

        self.cache_sync.on_deleted(&key, owner).await?;

        info!("API key deleted: id={}", id);
        Ok(())
    }

    /// Tear down and recreate the role of a persisted regular key
    pub async fn reprovision(&self, id: &ApiKeyId, owner: &Account) -> Result<(), DomainError> {
        let key = self.owned_key(id, owner).await?;

        if !key.is_regular() {
            return Err(DomainError::forbidden(format!(
                "{} API keys have no role of their own",
                key.key_type().description()
            )));
        }

        info!("Reprovisioning database role for API key: id={}", id);

        self.provisioner
            .teardown_quietly(key.db_role(), &key.affected_schemas())
            .await;
        self.provisioner.provision(&key, owner).await
    }

    /// Table privileges the key's role currently holds in the database
    pub async fn table_permissions_from_db(
        &self,
        id: &ApiKeyId,
        owner: &Account,
    ) -> Result<Vec<TablePermissions>, DomainError> {
        let key = self.owned_key(id, owner).await?;
        self.provisioner.table_permissions_from_db(key.db_role()).await
    }

    async fn owned_key(&self, id: &ApiKeyId, owner: &Account) -> Result<ApiKey, DomainError> {
        self.repository
            .get(id)
            .await?
            .filter(|key| key.owner_id() == owner.id())
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))
    }

    async fn create_key(
        &self,
        owner: &Account,
        key_type: ApiKeyType,
        name: &str,
        grants: &Value,
    ) -> Result<ApiKey, DomainError> {
        info!(
            "Creating API key: owner={}, type={}, name={}",
            owner.username(),
            key_type,
            name
        );

        let uniqueness = UniquenessCheck {
            name_taken: self.repository.name_exists(owner.id(), name).await?,
            type_taken: !key_type.is_regular()
                && self.repository.type_exists(owner.id(), key_type).await?,
        };

        let proposed = NewApiKey {
            key_type,
            name,
            grants,
        };
        let spec = validate_new_api_key(proposed, owner, uniqueness)?;

        // Surface a missing apis list before anything is stored
        spec.granted_apis()?;

        let key = self.insert(owner, key_type, name, spec).await?;

        if key.is_regular() {
            if let Err(e) = self.provisioner.provision(&key, owner).await {
                error!(
                    api_key = %key.id(),
                    role = %key.db_role(),
                    "Provisioning failed, removing API key record: {}", e
                );

                if let Err(cleanup) = self.repository.delete(key.id()).await {
                    warn!(api_key = %key.id(), "Could not remove unprovisioned API key: {}", cleanup);
                }

                return Err(e);
            }
        }

        self.cache_sync.on_saved(&key, owner, None).await?;

        info!("API key created: id={}, type={}", key.id(), key.key_type());
        Ok(key)
    }

    async fn credentials_for(
        &self,
        owner: &Account,
        key_type: ApiKeyType,
    ) -> Result<KeyCredentials, DomainError> {
        let lookup = self.repository.as_ref();

        match key_type {
            ApiKeyType::Master => Ok(KeyCredentials::new(
                self.generator.unique_token(lookup).await?,
                owner.database_username(),
                owner.database_password(),
            )),
            ApiKeyType::DefaultPublic => Ok(KeyCredentials::new(
                TOKEN_DEFAULT_PUBLIC,
                owner.database_public_username(),
                self.settings.public_db_password.as_str(),
            )),
            ApiKeyType::Regular => {
                self.generator
                    .regular_credentials(owner.username(), lookup)
                    .await
            }
        }
    }

    /// Persist a new key, retrying with fresh credentials on collisions
    async fn insert(
        &self,
        owner: &Account,
        key_type: ApiKeyType,
        name: &str,
        grants: GrantSpec,
    ) -> Result<ApiKey, DomainError> {
        let attempts = self.generator.max_attempts();

        for attempt in 1..=attempts {
            let credentials = self.credentials_for(owner, key_type).await?;
            let key = ApiKey::new(*owner.id(), key_type, name, grants.clone(), credentials);

            match self.repository.create(key).await {
                Ok(created) => return Ok(created),
                Err(DomainError::UniqueViolation { constraint })
                    if is_credential_constraint(&constraint)
                        && key_type != ApiKeyType::DefaultPublic =>
                {
                    warn!(attempt, constraint = %constraint, "Credential collision on insert, retrying");
                }
                Err(DomainError::UniqueViolation { constraint }) => {
                    return Err(constraint_error(constraint));
                }
                Err(e) => return Err(e),
            }
        }

        Err(DomainError::internal(format!(
            "Could not store API key with unique credentials after {} attempts",
            attempts
        )))
    }
}

fn is_credential_constraint(constraint: &str) -> bool {
    constraint == TOKEN_CONSTRAINT || constraint == DB_ROLE_CONSTRAINT
}

/// Commit-time name/type violations read as the validation errors they race with
fn constraint_error(constraint: String) -> DomainError {
    match constraint.as_str() {
        OWNER_NAME_CONSTRAINT => {
            DomainError::Validation(ApiKeyValidationError::name(TAKEN_MESSAGE).into())
        }
        OWNER_TYPE_CONSTRAINT => {
            DomainError::Validation(ApiKeyValidationError::key_type(TAKEN_MESSAGE).into())
        }
        _ => DomainError::unique_violation(constraint),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::AccountId;
    use crate::domain::api_key::{ApiKeyField, CredentialLookup};
    use crate::domain::cache::{Cache, CacheOp, MockCache};
    use crate::domain::provisioning::{MockSqlExecutor, SqlExecutionError};
    use crate::infrastructure::api_key::InMemoryApiKeyRepository;
    use crate::infrastructure::provisioning::DryRunSqlExecutor;
    use serde_json::json;

    struct Fixture {
        service: ApiKeyService<InMemoryApiKeyRepository>,
        repository: Arc<InMemoryApiKeyRepository>,
        executor: Arc<DryRunSqlExecutor>,
        cache: Arc<MockCache>,
    }

    fn fixture_with(executor: DryRunSqlExecutor) -> Fixture {
        let repository = Arc::new(InMemoryApiKeyRepository::new());
        let executor = Arc::new(executor);
        let cache = Arc::new(MockCache::new());

        let service = ApiKeyService::new(
            repository.clone(),
            RoleProvisioner::new(executor.clone()),
            CacheSync::new(cache.clone()),
        );

        Fixture {
            service,
            repository,
            executor,
            cache,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(DryRunSqlExecutor::new())
    }

    fn owner() -> Account {
        Account::new(AccountId::new(), "alice")
            .with_database_schema("public")
            .with_database_credentials("alice_owner", "owner-secret")
    }

    fn table_grants() -> Value {
        json!([
            {"type": "apis", "apis": ["sql"]},
            {"type": "database", "tables": [
                {"schema": "public", "name": "t1", "permissions": ["select", "INSERT"]}
            ]}
        ])
    }

    fn validation_messages(err: DomainError, field: ApiKeyField) -> Vec<String> {
        match err {
            DomainError::Validation(errors) => errors
                .messages_for(field)
                .into_iter()
                .map(str::to_string)
                .collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_master_key() {
        let f = fixture();
        let owner = owner();

        let key = f.service.create_master_key(&owner).await.unwrap();

        assert!(key.is_master());
        assert_eq!(key.name(), NAME_MASTER);
        assert_eq!(key.db_role(), "alice_owner");
        assert_eq!(key.db_password(), "owner-secret");
        assert_eq!(key.grants(), &GrantSpec::all_apis());
        assert!(f.executor.statements().is_empty());

        let cached = f
            .cache
            .get_fields(&format!("api_keys:alice:{}", key.token()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.get("type"), Some(&"master".to_string()));
        assert_eq!(cached.get("grants_maps"), Some(&"true".to_string()));
    }

    #[tokio::test]
    async fn test_second_master_key_is_rejected() {
        let f = fixture();
        let owner = owner();

        f.service.create_master_key(&owner).await.unwrap();
        let err = f.service.create_master_key(&owner).await.unwrap_err();

        assert_eq!(validation_messages(err, ApiKeyField::Type), vec![TAKEN_MESSAGE]);
    }

    #[tokio::test]
    async fn test_create_default_public_key() {
        let f = fixture().service.with_settings(ApiKeySettings {
            public_db_password: "shared".to_string(),
        });
        let owner = owner();

        let key = f.create_default_public_key(&owner).await.unwrap();

        assert!(key.is_default_public());
        assert_eq!(key.token(), TOKEN_DEFAULT_PUBLIC);
        assert_eq!(key.db_role(), "publicuser");
        assert_eq!(key.db_password(), "shared");
    }

    #[tokio::test]
    async fn test_create_regular_key_provisions_role() {
        let f = fixture();
        let owner = owner();

        let key = f
            .service
            .create_regular_key(&owner, "reporting", &table_grants())
            .await
            .unwrap();

        assert!(key.is_regular());
        assert!(key.db_role().starts_with("alice_role_"));
        assert_eq!(key.table_permissions().len(), 1);
        assert!(key.table_permissions()[0].is_write());

        let statements = f.executor.statements();
        assert_eq!(statements.len(), 6);
        assert!(statements[0].starts_with(&format!("CREATE ROLE \"{}\"", key.db_role())));
        assert_eq!(
            statements[3],
            format!("GRANT select, insert ON TABLE \"public\".\"t1\" TO \"{}\"", key.db_role())
        );

        assert_eq!(
            f.cache.ops(),
            vec![CacheOp::Set(format!("api_keys:alice:{}", key.token()))]
        );
    }

    #[tokio::test]
    async fn test_invalid_grants_touch_nothing() {
        let f = fixture();
        let owner = owner();
        let grants = json!([
            {"type": "apis", "apis": ["sql"]},
            {"type": "database", "tables": []},
            {"type": "database", "tables": []}
        ]);

        let err = f
            .service
            .create_regular_key(&owner, "reporting", &grants)
            .await
            .unwrap_err();

        assert_eq!(
            validation_messages(err, ApiKeyField::Grants),
            vec!["only one database section is allowed"]
        );
        assert!(f.executor.statements().is_empty());
        assert!(f.cache.ops().is_empty());
        assert!(f.repository.list_by_owner(owner.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_apis_list_is_unprocessable_and_not_stored() {
        let f = fixture();
        let owner = owner();

        let err = f
            .service
            .create_regular_key(&owner, "reporting", &json!([{"type": "apis"}]))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::UnprocessableEntity { .. }));
        assert!(f.repository.list_by_owner(owner.id()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_name_is_rejected() {
        let f = fixture();
        let owner = owner();

        f.service
            .create_regular_key(&owner, "reporting", &table_grants())
            .await
            .unwrap();
        let err = f
            .service
            .create_regular_key(&owner, "reporting", &table_grants())
            .await
            .unwrap_err();

        assert_eq!(validation_messages(err, ApiKeyField::Name), vec![TAKEN_MESSAGE]);
    }

    #[tokio::test]
    async fn test_provisioning_failure_removes_record() {
        let f = fixture_with(
            DryRunSqlExecutor::new().failing_on("GRANT select", "relation \"public.t1\" does not exist"),
        );
        let owner = owner();

        let err = f
            .service
            .create_regular_key(&owner, "reporting", &table_grants())
            .await
            .unwrap_err();

        match err {
            DomainError::Provisioning { message } => {
                assert_eq!(message, "relation \"public.t1\" does not exist");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(f.repository.list_by_owner(owner.id()).await.unwrap().is_empty());
        assert!(f.cache.ops().is_empty());
        assert!(f
            .executor
            .statements()
            .last()
            .unwrap()
            .starts_with("DROP ROLE"));
    }

    #[tokio::test]
    async fn test_first_statement_failure_skips_teardown() {
        let repository = Arc::new(InMemoryApiKeyRepository::new());
        let mut executor = MockSqlExecutor::new();
        executor.expect_execute().times(1).returning(|_| {
            Err(SqlExecutionError::Database(
                "ERROR:  permission denied to create role".to_string(),
            ))
        });

        let service = ApiKeyService::new(
            repository.clone(),
            RoleProvisioner::new(Arc::new(executor)),
            CacheSync::new(Arc::new(MockCache::new())),
        );

        let err = service
            .create_regular_key(&owner(), "reporting", &table_grants())
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::Provisioning { .. }));
    }

    #[tokio::test]
    async fn test_regenerate_token_moves_cache_entry() {
        let f = fixture();
        let owner = owner();

        let key = f
            .service
            .create_regular_key(&owner, "reporting", &table_grants())
            .await
            .unwrap();
        let old_token = key.token().to_string();

        let rotated = f.service.regenerate_token(key.id(), &owner).await.unwrap();

        assert_ne!(rotated.token(), old_token);
        assert!(f.service.get_by_token(&old_token).await.unwrap().is_none());
        assert_eq!(
            f.cache.ops()[1..],
            [
                CacheOp::Delete(format!("api_keys:alice:{}", old_token)),
                CacheOp::Set(format!("api_keys:alice:{}", rotated.token())),
            ]
        );
    }

    #[tokio::test]
    async fn test_default_public_token_cannot_be_regenerated() {
        let f = fixture();
        let owner = owner();

        let key = f.service.create_default_public_key(&owner).await.unwrap();
        let err = f.service.regenerate_token(key.id(), &owner).await.unwrap_err();

        assert!(matches!(err, DomainError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_delete_regular_key() {
        let f = fixture();
        let owner = owner();

        let key = f
            .service
            .create_regular_key(&owner, "reporting", &table_grants())
            .await
            .unwrap();
        f.executor.clear();

        f.service.delete(key.id(), &owner).await.unwrap();

        assert!(f.service.get(key.id()).await.unwrap().is_none());
        assert!(f.cache.keys().is_empty());

        let role = key.db_role();
        assert_eq!(
            f.executor.statements(),
            vec![
                format!("REVOKE ALL PRIVILEGES ON ALL TABLES IN SCHEMA \"public\" FROM \"{}\"", role),
                format!("REVOKE USAGE ON SCHEMA \"public\" FROM \"{}\"", role),
                format!("REVOKE USAGE, SELECT ON ALL SEQUENCES IN SCHEMA \"public\" FROM \"{}\"", role),
                format!("DROP ROLE \"{}\"", role),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_role_drop_keeps_key_for_retry() {
        let f = fixture_with(DryRunSqlExecutor::new().failing_on("DROP ROLE", "role is in use"));
        let owner = owner();

        let key = f
            .service
            .create_regular_key(&owner, "reporting", &table_grants())
            .await
            .unwrap();

        let err = f.service.delete(key.id(), &owner).await.unwrap_err();

        match err {
            DomainError::Provisioning { message } => assert_eq!(message, "role is in use"),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(f.service.get(key.id()).await.unwrap().is_some());
        assert_eq!(f.cache.keys(), vec![format!("api_keys:alice:{}", key.token())]);

        f.service.delete(key.id(), &owner).await.unwrap();

        assert!(f.service.get(key.id()).await.unwrap().is_none());
        assert!(f.cache.keys().is_empty());
    }

    #[tokio::test]
    async fn test_master_key_cannot_be_deleted() {
        let f = fixture();
        let owner = owner();

        let key = f.service.create_master_key(&owner).await.unwrap();
        let err = f.service.delete(key.id(), &owner).await.unwrap_err();

        assert!(matches!(err, DomainError::Forbidden { .. }));
        assert!(f.service.get(key.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_keys_of_other_owners_are_not_found() {
        let f = fixture();
        let owner = owner();

        let key = f
            .service
            .create_regular_key(&owner, "reporting", &table_grants())
            .await
            .unwrap();

        let stranger = Account::new(AccountId::new(), "mallory");
        let err = f.service.delete(key.id(), &stranger).await.unwrap_err();

        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_reprovision_recreates_role() {
        let f = fixture();
        let owner = owner();

        let key = f
            .service
            .create_regular_key(&owner, "reporting", &table_grants())
            .await
            .unwrap();
        f.executor.clear();

        f.service.reprovision(key.id(), &owner).await.unwrap();

        let statements = f.executor.statements();
        assert_eq!(statements.len(), 4 + 6);
        assert!(statements[3].starts_with("DROP ROLE"));
        assert!(statements[4].starts_with("CREATE ROLE"));
    }

    #[tokio::test]
    async fn test_list_for_owner() {
        let f = fixture();
        let owner = owner();

        f.service.create_master_key(&owner).await.unwrap();
        f.service.create_default_public_key(&owner).await.unwrap();
        f.service
            .create_regular_key(&owner, "reporting", &table_grants())
            .await
            .unwrap();

        assert_eq!(f.service.list_for_owner(&owner).await.unwrap().len(), 3);
    }

    #[test]
    fn test_constraint_error_mapping() {
        assert!(constraint_error(OWNER_NAME_CONSTRAINT.to_string()).is_validation());
        assert!(constraint_error(OWNER_TYPE_CONSTRAINT.to_string()).is_validation());
        assert!(matches!(
            constraint_error(TOKEN_CONSTRAINT.to_string()),
            DomainError::UniqueViolation { .. }
        ));
    }

    /// Delegates to the in-memory repository, failing scripted writes first
    #[derive(Debug, Default)]
    struct CollidingRepository {
        inner: InMemoryApiKeyRepository,
        create_failures: std::sync::Mutex<Vec<&'static str>>,
        update_failures: std::sync::Mutex<Vec<&'static str>>,
        attempts: std::sync::Mutex<Vec<ApiKey>>,
    }

    impl CollidingRepository {
        fn failing_create(constraint: &'static str) -> Self {
            let repository = Self::default();
            repository.create_failures.lock().unwrap().push(constraint);
            repository
        }

        fn failing_update(constraint: &'static str) -> Self {
            let repository = Self::default();
            repository.update_failures.lock().unwrap().push(constraint);
            repository
        }

        fn attempts(&self) -> Vec<ApiKey> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl CredentialLookup for CollidingRepository {
        async fn token_exists(&self, token: &str) -> Result<bool, DomainError> {
            self.inner.token_exists(token).await
        }

        async fn db_role_exists(&self, db_role: &str) -> Result<bool, DomainError> {
            self.inner.db_role_exists(db_role).await
        }
    }

    #[async_trait::async_trait]
    impl ApiKeyRepository for CollidingRepository {
        async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
            self.inner.get(id).await
        }

        async fn get_by_token(&self, token: &str) -> Result<Option<ApiKey>, DomainError> {
            self.inner.get_by_token(token).await
        }

        async fn list_by_owner(&self, owner_id: &AccountId) -> Result<Vec<ApiKey>, DomainError> {
            self.inner.list_by_owner(owner_id).await
        }

        async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
            self.attempts.lock().unwrap().push(api_key.clone());
            if let Some(constraint) = self.create_failures.lock().unwrap().pop() {
                return Err(DomainError::unique_violation(constraint));
            }
            self.inner.create(api_key).await
        }

        async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError> {
            self.attempts.lock().unwrap().push(api_key.clone());
            if let Some(constraint) = self.update_failures.lock().unwrap().pop() {
                return Err(DomainError::unique_violation(constraint));
            }
            self.inner.update(api_key).await
        }

        async fn delete(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
            self.inner.delete(id).await
        }

        async fn name_exists(&self, owner_id: &AccountId, name: &str) -> Result<bool, DomainError> {
            self.inner.name_exists(owner_id, name).await
        }

        async fn type_exists(
            &self,
            owner_id: &AccountId,
            key_type: ApiKeyType,
        ) -> Result<bool, DomainError> {
            self.inner.type_exists(owner_id, key_type).await
        }
    }

    fn colliding_service(
        repository: Arc<CollidingRepository>,
    ) -> ApiKeyService<CollidingRepository> {
        ApiKeyService::new(
            repository,
            RoleProvisioner::new(Arc::new(DryRunSqlExecutor::new())),
            CacheSync::new(Arc::new(MockCache::new())),
        )
    }

    #[tokio::test]
    async fn test_token_collision_on_insert_retries_with_fresh_token() {
        let repository = Arc::new(CollidingRepository::failing_create(TOKEN_CONSTRAINT));
        let service = colliding_service(repository.clone());

        let key = service
            .create_regular_key(&owner(), "reporting", &table_grants())
            .await
            .unwrap();

        let attempts = repository.attempts();
        assert_eq!(attempts.len(), 2);
        assert_ne!(attempts[0].token(), attempts[1].token());
        assert_eq!(key.token(), attempts[1].token());
        assert!(repository.get(key.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_role_collision_on_insert_retries_with_fresh_role() {
        let repository = Arc::new(CollidingRepository::failing_create(DB_ROLE_CONSTRAINT));
        let service = colliding_service(repository.clone());

        let key = service
            .create_regular_key(&owner(), "reporting", &table_grants())
            .await
            .unwrap();

        let attempts = repository.attempts();
        assert_eq!(attempts.len(), 2);
        assert_ne!(attempts[0].db_role(), attempts[1].db_role());
        assert_eq!(key.db_role(), attempts[1].db_role());
    }

    #[tokio::test]
    async fn test_token_collision_on_rotation_retries() {
        let repository = Arc::new(CollidingRepository::failing_update(TOKEN_CONSTRAINT));
        let service = colliding_service(repository.clone());
        let owner = owner();

        let key = service
            .create_regular_key(&owner, "reporting", &table_grants())
            .await
            .unwrap();
        let rotated = service.regenerate_token(key.id(), &owner).await.unwrap();

        let updates = &repository.attempts()[1..];
        assert_eq!(updates.len(), 2);
        assert_ne!(updates[0].token(), updates[1].token());
        assert_eq!(rotated.token(), updates[1].token());
        assert_ne!(rotated.token(), key.token());
    }

    #[tokio::test]
    async fn test_name_collision_on_insert_is_a_validation_error() {
        let repository = Arc::new(CollidingRepository::failing_create(OWNER_NAME_CONSTRAINT));
        let service = colliding_service(repository.clone());

        let err = service
            .create_regular_key(&owner(), "reporting", &table_grants())
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Validation failed: name has already been taken");
        assert_eq!(validation_messages(err, ApiKeyField::Name), vec![TAKEN_MESSAGE]);
        assert_eq!(repository.attempts().len(), 1);
    }
}
