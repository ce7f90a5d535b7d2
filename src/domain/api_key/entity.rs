//! API Key entity and related types

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use super::validation::{ApiKeyValidationError, NOT_INCLUDED_MESSAGE};
use crate::domain::account::AccountId;
use crate::domain::grants::{Api, GrantSection, GrantSpec, TablePermissions};
use crate::domain::DomainError;

pub const NAME_MASTER: &str = "Master";
pub const NAME_DEFAULT_PUBLIC: &str = "Default public";

/// Well-known token shared by every default public key
pub const TOKEN_DEFAULT_PUBLIC: &str = "default_public";

/// API Key identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKeyId(Uuid);

impl ApiKeyId {
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

impl Default for ApiKeyId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ApiKeyId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::not_found(format!("Invalid API key id '{}': {}", s, e)))
    }
}

impl std::fmt::Display for ApiKeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of API key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyType {
    /// Full-access key backed by the account's own database user
    Master,
    /// Key for anonymous/public access, backed by the public database user
    DefaultPublic,
    /// User-defined key with its own database role
    Regular,
}

impl ApiKeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::DefaultPublic => "default_public",
            Self::Regular => "regular",
        }
    }

    /// Human readable form used in validation messages
    pub fn description(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::DefaultPublic => "default public",
            Self::Regular => "regular",
        }
    }

    pub fn is_regular(&self) -> bool {
        matches!(self, Self::Regular)
    }
}

impl FromStr for ApiKeyType {
    type Err = ApiKeyValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "master" => Ok(Self::Master),
            "default_public" => Ok(Self::DefaultPublic),
            "regular" => Ok(Self::Regular),
            _ => Err(ApiKeyValidationError::key_type(NOT_INCLUDED_MESSAGE)),
        }
    }
}

impl std::fmt::Display for ApiKeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secrets identifying the database principal behind a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCredentials {
    pub token: String,
    pub db_role: String,
    pub db_password: String,
}

impl KeyCredentials {
    pub fn new(
        token: impl Into<String>,
        db_role: impl Into<String>,
        db_password: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            db_role: db_role.into(),
            db_password: db_password.into(),
        }
    }
}

/// API Key entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    id: ApiKeyId,
    owner_id: AccountId,
    #[serde(rename = "type")]
    key_type: ApiKeyType,
    name: String,
    #[serde(deserialize_with = "deserialize_grants")]
    grants: GrantSpec,
    token: String,
    db_role: String,
    db_password: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ApiKey {
    /// Build a key from already validated parts
    pub fn new(
        owner_id: AccountId,
        key_type: ApiKeyType,
        name: impl Into<String>,
        grants: GrantSpec,
        credentials: KeyCredentials,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: ApiKeyId::new(),
            owner_id,
            key_type,
            name: name.into(),
            grants,
            token: credentials.token,
            db_role: credentials.db_role,
            db_password: credentials.db_password,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a persisted key
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ApiKeyId,
        owner_id: AccountId,
        key_type: ApiKeyType,
        name: String,
        grants: GrantSpec,
        credentials: KeyCredentials,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            key_type,
            name,
            grants,
            token: credentials.token,
            db_role: credentials.db_role,
            db_password: credentials.db_password,
            created_at,
            updated_at,
        }
    }

    // Getters

    pub fn id(&self) -> &ApiKeyId {
        &self.id
    }

    pub fn owner_id(&self) -> &AccountId {
        &self.owner_id
    }

    pub fn key_type(&self) -> ApiKeyType {
        self.key_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn grants(&self) -> &GrantSpec {
        &self.grants
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn db_role(&self) -> &str {
        &self.db_role
    }

    pub fn db_password(&self) -> &str {
        &self.db_password
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Type checks

    pub fn is_master(&self) -> bool {
        self.key_type == ApiKeyType::Master
    }

    pub fn is_default_public(&self) -> bool {
        self.key_type == ApiKeyType::DefaultPublic
    }

    pub fn is_regular(&self) -> bool {
        self.key_type == ApiKeyType::Regular
    }

    /// Only regular keys may be deleted by their owner
    pub fn can_be_deleted(&self) -> bool {
        self.is_regular()
    }

    // Derived grant views

    pub fn granted_apis(&self) -> Result<&[Api], DomainError> {
        self.grants.granted_apis()
    }

    pub fn table_permissions(&self) -> &[TablePermissions] {
        self.grants.table_permissions()
    }

    pub fn affected_schemas(&self) -> Vec<String> {
        self.grants.affected_schemas()
    }

    // Mutators

    /// Replace the token, returning the previous one
    pub fn rotate_token(&mut self, token: impl Into<String>) -> String {
        let previous = std::mem::replace(&mut self.token, token.into());
        self.touch();
        previous
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn deserialize_grants<'de, D: Deserializer<'de>>(deserializer: D) -> Result<GrantSpec, D::Error> {
    Vec::<GrantSection>::deserialize(deserializer).map(GrantSpec::from_sections)
}
