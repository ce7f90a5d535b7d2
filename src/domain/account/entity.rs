//! Account entity: the owner of API keys

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(Uuid);

impl AccountId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for AccountId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Read-only view of the account that issues keys.
///
/// Supplied by the account subsystem; this crate never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    id: AccountId,
    username: String,
    database_schema: String,
    database_username: String,
    database_password: String,
    database_public_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    search_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    organization_member_role: Option<String>,
}

impl Account {
    /// Create an account whose database user shares its username and schema
    pub fn new(id: AccountId, username: impl Into<String>) -> Self {
        let username = username.into();

        Self {
            id,
            database_schema: username.clone(),
            database_username: format!("{}_owner", username),
            database_password: String::new(),
            database_public_username: "publicuser".to_string(),
            search_path: None,
            organization_member_role: None,
            username,
        }
    }

    pub fn with_database_schema(mut self, schema: impl Into<String>) -> Self {
        self.database_schema = schema.into();
        self
    }

    pub fn with_database_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.database_username = username.into();
        self.database_password = password.into();
        self
    }

    pub fn with_database_public_username(mut self, username: impl Into<String>) -> Self {
        self.database_public_username = username.into();
        self
    }

    pub fn with_search_path(mut self, search_path: impl Into<String>) -> Self {
        self.search_path = Some(search_path.into());
        self
    }

    pub fn with_organization_member_role(mut self, role: impl Into<String>) -> Self {
        self.organization_member_role = Some(role.into());
        self
    }

    // Getters

    pub fn id(&self) -> &AccountId {
        &self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn database_schema(&self) -> &str {
        &self.database_schema
    }

    pub fn database_username(&self) -> &str {
        &self.database_username
    }

    pub fn database_password(&self) -> &str {
        &self.database_password
    }

    pub fn database_public_username(&self) -> &str {
        &self.database_public_username
    }

    /// Search path assigned to roles created for this account.
    ///
    /// Defaults to the account schema followed by `public`.
    pub fn search_path(&self) -> String {
        match &self.search_path {
            Some(path) => path.clone(),
            None => format!("\"{}\", public", self.database_schema.replace('"', "\"\"")),
        }
    }

    pub fn organization_member_role(&self) -> Option<&str> {
        self.organization_member_role.as_deref()
    }

    pub fn is_organization_member(&self) -> bool {
        self.organization_member_role.is_some()
    }
}
