//! Database role provisioner
//!
//! Runs the creation and teardown sequences built in
//! [`crate::domain::provisioning`] through a [`SqlExecutor`], translating
//! engine failures into [`DomainError::Provisioning`].

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::domain::account::Account;
use crate::domain::api_key::ApiKey;
use crate::domain::grants::TablePermissions;
use crate::domain::provisioning::{
    creation_plan, teardown_plan, PrivilegeCommand, SqlExecutionError, SqlExecutor,
};
use crate::domain::DomainError;

/// Message used when no engine message can be extracted
pub const UNEXPECTED_ERROR_MESSAGE: &str = "Unexpected error";

static ENGINE_ERROR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:ERROR:|error returned from database:)\s+(.+)").unwrap()
});

/// Extract the engine's message from a raw driver error string
pub fn extract_error_message(raw: &str) -> String {
    ENGINE_ERROR_PATTERN
        .captures(raw)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| UNEXPECTED_ERROR_MESSAGE.to_string())
}

/// Creates, grants and drops the database roles behind regular keys
#[derive(Clone)]
pub struct RoleProvisioner {
    executor: Arc<dyn SqlExecutor>,
}

impl fmt::Debug for RoleProvisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleProvisioner").finish_non_exhaustive()
    }
}

impl RoleProvisioner {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self { executor }
    }

    /// Create the key's role and grant it what the key's grants describe.
    ///
    /// If a statement fails after the role was created, the role is torn down
    /// again (best effort) before the error is returned.
    pub async fn provision(&self, key: &ApiKey, owner: &Account) -> Result<(), DomainError> {
        info!(role = %key.db_role(), api_key = %key.id(), "Provisioning database role");

        let mut role_created = false;

        for command in creation_plan(key, owner) {
            if let Err(e) = self.run(&command).await {
                if role_created {
                    self.teardown_quietly(key.db_role(), &key.affected_schemas())
                        .await;
                }
                return Err(e);
            }

            role_created = true;
        }

        Ok(())
    }

    /// Revoke the role's privileges and drop it, stopping at the first failure.
    ///
    /// The schema list is the union of `recorded_schemas` and the schemas the
    /// role currently holds grants in.
    pub async fn deprovision(
        &self,
        role: &str,
        recorded_schemas: &[String],
    ) -> Result<(), DomainError> {
        info!(role = %role, "Dropping database role");

        let schemas = self.teardown_schemas(role, recorded_schemas).await;

        for command in teardown_plan(role, &schemas) {
            self.run(&command).await?;
        }

        Ok(())
    }

    /// Best-effort teardown: every statement is attempted, failures only logged
    pub async fn teardown_quietly(&self, role: &str, recorded_schemas: &[String]) {
        let schemas = self.teardown_schemas(role, recorded_schemas).await;

        for command in teardown_plan(role, &schemas) {
            if let Err(e) = self.run(&command).await {
                debug!(role = %role, "Ignoring teardown failure: {}", e);
            }
        }
    }

    /// Live table grants of `role`, read from the database catalog
    pub async fn table_permissions_from_db(
        &self,
        role: &str,
    ) -> Result<Vec<TablePermissions>, DomainError> {
        let rows = self
            .executor
            .role_table_grants(role)
            .await
            .map_err(|e| translate_error(role, &e))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                TablePermissions::with_permissions(
                    row.table_schema,
                    row.table_name,
                    row.privilege_types
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty()),
                )
            })
            .collect())
    }

    async fn teardown_schemas(&self, role: &str, recorded_schemas: &[String]) -> Vec<String> {
        let mut schemas = recorded_schemas.to_vec();

        match self.table_permissions_from_db(role).await {
            Ok(tables) => {
                for table in tables {
                    if !schemas.iter().any(|s| s == table.schema()) {
                        schemas.push(table.schema().to_string());
                    }
                }
            }
            Err(e) => warn!(role = %role, "Could not read live grants before teardown: {}", e),
        }

        schemas
    }

    async fn run(&self, command: &PrivilegeCommand) -> Result<(), DomainError> {
        debug!(role = %command.role(), "Executing: {}", command);

        self.executor
            .execute(&command.to_sql())
            .await
            .map_err(|e| translate_error(command.role(), &e))
    }
}

fn translate_error(role: &str, e: &SqlExecutionError) -> DomainError {
    let message = extract_error_message(&e.to_string());
    error!(role = %role, error = %e, "Provisioning statement failed: {}", message);
    DomainError::provisioning(message)
}
