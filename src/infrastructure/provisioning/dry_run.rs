//! Recording SQL executor
//!
//! Accepts every statement without touching a database and records it, so
//! tests can assert the statements a flow sends. Failures and live grants
//! can be scripted.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::provisioning::{RoleTableGrant, SqlExecutionError, SqlExecutor};

#[derive(Debug, Default)]
pub struct DryRunSqlExecutor {
    statements: Mutex<Vec<String>>,
    live_grants: Mutex<Vec<RoleTableGrant>>,
    failing_statement: Mutex<Option<(String, String)>>,
}

impl DryRunSqlExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants reported by `role_table_grants`, whatever the role
    pub fn with_live_grants(self, grants: Vec<RoleTableGrant>) -> Self {
        *self.live_grants.lock().unwrap_or_else(|e| e.into_inner()) = grants;
        self
    }

    /// Reject the first statement starting with `prefix` with an engine error
    pub fn failing_on(self, prefix: impl Into<String>, message: impl Into<String>) -> Self {
        *self.failing_statement.lock().unwrap_or_else(|e| e.into_inner()) =
            Some((prefix.into(), message.into()));
        self
    }

    /// Statements received so far, in order
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.statements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[async_trait]
impl SqlExecutor for DryRunSqlExecutor {
    async fn execute(&self, sql: &str) -> Result<(), SqlExecutionError> {
        self.statements
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sql.to_string());

        let mut failing = self
            .failing_statement
            .lock()
            .unwrap_or_else(|e| e.into_inner());

        let matched = failing
            .as_ref()
            .is_some_and(|(prefix, _)| sql.starts_with(prefix.as_str()));

        match failing.take() {
            Some((_, message)) if matched => {
                Err(SqlExecutionError::Database(format!("ERROR:  {}", message)))
            }
            pending => {
                *failing = pending;
                Ok(())
            }
        }
    }

    async fn role_table_grants(
        &self,
        _role: &str,
    ) -> Result<Vec<RoleTableGrant>, SqlExecutionError> {
        Ok(self
            .live_grants
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_statements() {
        let executor = DryRunSqlExecutor::new();

        executor.execute("DROP ROLE \"a\"").await.unwrap();
        executor.execute("DROP ROLE \"b\"").await.unwrap();

        assert_eq!(executor.statements(), vec!["DROP ROLE \"a\"", "DROP ROLE \"b\""]);

        executor.clear();
        assert!(executor.statements().is_empty());
    }

    #[tokio::test]
    async fn test_fails_once_on_matching_statement() {
        let executor = DryRunSqlExecutor::new().failing_on("GRANT", "relation \"t9\" does not exist");

        assert!(executor.execute("CREATE ROLE \"a\"").await.is_ok());
        assert_eq!(
            executor.execute("GRANT select ON TABLE \"t9\" TO \"a\"").await,
            Err(SqlExecutionError::Database(
                "ERROR:  relation \"t9\" does not exist".to_string()
            ))
        );
        assert!(executor.execute("GRANT select ON TABLE \"t9\" TO \"a\"").await.is_ok());
    }
}
