//! PostgreSQL SQL executor

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::domain::provisioning::{RoleTableGrant, SqlExecutionError, SqlExecutor};
use crate::domain::DomainError;

const ROLE_TABLE_GRANTS_QUERY: &str = r#"
    SELECT table_schema, table_name,
           string_agg(lower(privilege_type), ',') AS privilege_types
    FROM information_schema.role_table_grants
    WHERE grantee = $1
    GROUP BY table_schema, table_name
    ORDER BY table_schema, table_name
"#;

/// PostgreSQL connection settings
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL (must connect as a role allowed to create roles)
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/db_api_keys".to_string(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Open a connection pool with these settings
    pub async fn connect(&self) -> Result<PgPool, DomainError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(self.connect_timeout_secs))
            .connect(&self.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))
    }
}

/// Executes provisioning statements on a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PostgresSqlExecutor {
    pool: PgPool,
}

impl PostgresSqlExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SqlExecutor for PostgresSqlExecutor {
    async fn execute(&self, sql: &str) -> Result<(), SqlExecutionError> {
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(to_execution_error)
    }

    async fn role_table_grants(
        &self,
        role: &str,
    ) -> Result<Vec<RoleTableGrant>, SqlExecutionError> {
        let rows = sqlx::query(ROLE_TABLE_GRANTS_QUERY)
            .bind(role)
            .fetch_all(&self.pool)
            .await
            .map_err(to_execution_error)?;

        Ok(rows
            .iter()
            .map(|row| RoleTableGrant {
                table_schema: row.get("table_schema"),
                table_name: row.get("table_name"),
                privilege_types: row.get("privilege_types"),
            })
            .collect())
    }
}

fn to_execution_error(e: sqlx::Error) -> SqlExecutionError {
    match e {
        sqlx::Error::Database(_) => SqlExecutionError::Database(e.to_string()),
        other => SqlExecutionError::Connection(other.to_string()),
    }
}
