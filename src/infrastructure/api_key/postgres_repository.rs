//! PostgreSQL API key repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::account::AccountId;
use crate::domain::api_key::{
    ApiKey, ApiKeyId, ApiKeyRepository, ApiKeyType, CredentialLookup, KeyCredentials,
};
use crate::domain::grants::{GrantSection, GrantSpec};
use crate::domain::DomainError;

const SELECT_COLUMNS: &str = "id, owner_id, type, name, grants, token, db_role, db_password, \
                              created_at, updated_at";

/// Table and indexes backing the repository.
///
/// Index names double as the constraint names reported on violation.
const SCHEMA_STATEMENTS: [&str; 4] = [
    r#"
    CREATE TABLE IF NOT EXISTS api_keys (
        id UUID PRIMARY KEY,
        owner_id UUID NOT NULL,
        type VARCHAR(32) NOT NULL,
        name VARCHAR(255) NOT NULL,
        grants JSONB NOT NULL,
        token VARCHAR(255) NOT NULL,
        db_role VARCHAR(63) NOT NULL,
        db_password VARCHAR(255) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT api_keys_owner_name_key UNIQUE (owner_id, name)
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS api_keys_token_key \
     ON api_keys (token) WHERE type <> 'default_public'",
    "CREATE UNIQUE INDEX IF NOT EXISTS api_keys_db_role_key \
     ON api_keys (db_role) WHERE type = 'regular'",
    "CREATE UNIQUE INDEX IF NOT EXISTS api_keys_owner_type_key \
     ON api_keys (owner_id, type) WHERE type <> 'regular'",
];

/// PostgreSQL implementation of ApiKeyRepository
#[derive(Debug, Clone)]
pub struct PostgresApiKeyRepository {
    pool: PgPool,
}

impl PostgresApiKeyRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Ensures the `api_keys` table and its unique indexes exist
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        for statement in SCHEMA_STATEMENTS {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    DomainError::storage(format!("Failed to create api_keys table: {}", e))
                })?;
        }

        Ok(())
    }

    async fn fetch_one_by(&self, column: &str, value: &str) -> Result<Option<ApiKey>, DomainError> {
        let query = format!("SELECT {} FROM api_keys WHERE {} = $1", SELECT_COLUMNS, column);

        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get API key: {}", e)))?;

        row.as_ref().map(row_to_api_key).transpose()
    }

    async fn exists(&self, query: &str, value: &str) -> Result<bool, DomainError> {
        sqlx::query_scalar::<_, bool>(query)
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to check API key: {}", e)))
    }
}

#[async_trait]
impl CredentialLookup for PostgresApiKeyRepository {
    async fn token_exists(&self, token: &str) -> Result<bool, DomainError> {
        self.exists("SELECT EXISTS(SELECT 1 FROM api_keys WHERE token = $1)", token)
            .await
    }

    async fn db_role_exists(&self, db_role: &str) -> Result<bool, DomainError> {
        self.exists("SELECT EXISTS(SELECT 1 FROM api_keys WHERE db_role = $1)", db_role)
            .await
    }
}

#[async_trait]
impl ApiKeyRepository for PostgresApiKeyRepository {
    async fn get(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let query = format!("SELECT {} FROM api_keys WHERE id = $1", SELECT_COLUMNS);

        let row = sqlx::query(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get API key: {}", e)))?;

        row.as_ref().map(row_to_api_key).transpose()
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<ApiKey>, DomainError> {
        self.fetch_one_by("token", token).await
    }

    async fn list_by_owner(&self, owner_id: &AccountId) -> Result<Vec<ApiKey>, DomainError> {
        let query = format!(
            "SELECT {} FROM api_keys WHERE owner_id = $1 ORDER BY created_at",
            SELECT_COLUMNS
        );

        let rows = sqlx::query(&query)
            .bind(owner_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to list API keys: {}", e)))?;

        rows.iter().map(row_to_api_key).collect()
    }

    async fn create(&self, api_key: ApiKey) -> Result<ApiKey, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (id, owner_id, type, name, grants, token, db_role,
                                  db_password, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(api_key.id().as_uuid())
        .bind(api_key.owner_id().as_uuid())
        .bind(api_key.key_type().as_str())
        .bind(api_key.name())
        .bind(Json(api_key.grants()))
        .bind(api_key.token())
        .bind(api_key.db_role())
        .bind(api_key.db_password())
        .bind(api_key.created_at())
        .bind(api_key.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "create"))?;

        Ok(api_key)
    }

    async fn update(&self, api_key: &ApiKey) -> Result<ApiKey, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE api_keys
            SET name = $2, grants = $3, token = $4, db_role = $5, db_password = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(api_key.id().as_uuid())
        .bind(api_key.name())
        .bind(Json(api_key.grants()))
        .bind(api_key.token())
        .bind(api_key.db_role())
        .bind(api_key.db_password())
        .bind(api_key.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, "update"))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "API key '{}' not found",
                api_key.id()
            )));
        }

        Ok(api_key.clone())
    }

    async fn delete(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete API key: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn name_exists(&self, owner_id: &AccountId, name: &str) -> Result<bool, DomainError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM api_keys WHERE owner_id = $1 AND name = $2)",
        )
        .bind(owner_id.as_uuid())
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check API key name: {}", e)))
    }

    async fn type_exists(
        &self,
        owner_id: &AccountId,
        key_type: ApiKeyType,
    ) -> Result<bool, DomainError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM api_keys WHERE owner_id = $1 AND type = $2)",
        )
        .bind(owner_id.as_uuid())
        .bind(key_type.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to check API key type: {}", e)))
    }
}

fn map_write_error(e: sqlx::Error, action: &str) -> DomainError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            return DomainError::unique_violation(constraint);
        }
    }

    DomainError::storage(format!("Failed to {} API key: {}", action, e))
}

fn row_to_api_key(row: &sqlx::postgres::PgRow) -> Result<ApiKey, DomainError> {
    let id: Uuid = row.get("id");
    let owner_id: Uuid = row.get("owner_id");
    let key_type: String = row.get("type");
    let name: String = row.get("name");
    let grants: Json<Vec<GrantSection>> = row
        .try_get("grants")
        .map_err(|e| DomainError::storage(format!("Invalid grants in database: {}", e)))?;
    let token: String = row.get("token");
    let db_role: String = row.get("db_role");
    let db_password: String = row.get("db_password");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    let key_type: ApiKeyType = key_type
        .parse()
        .map_err(|e| DomainError::storage(format!("Invalid API key type in database: {}", e)))?;

    Ok(ApiKey::restore(
        ApiKeyId::from_uuid(id),
        AccountId::from_uuid(owner_id),
        key_type,
        name,
        GrantSpec::from_sections(grants.0),
        KeyCredentials::new(token, db_role, db_password),
        created_at,
        updated_at,
    ))
}
