//! SQL execution channel used for provisioning

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

/// Failure reported by the execution channel
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqlExecutionError {
    /// The engine rejected the statement; carries the engine's error text
    #[error("{0}")]
    Database(String),

    /// The statement never reached the engine
    #[error("connection error: {0}")]
    Connection(String),
}

/// One row of the live role-to-table grant catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTableGrant {
    pub table_schema: String,
    pub table_name: String,
    /// Comma-joined, lower-cased privilege types
    pub privilege_types: String,
}

/// Executes statements against the database with elevated privilege
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Runs one statement
    async fn execute(&self, sql: &str) -> Result<(), SqlExecutionError>;

    /// Reads the table privileges currently granted to `role`
    async fn role_table_grants(&self, role: &str) -> Result<Vec<RoleTableGrant>, SqlExecutionError>;
}
