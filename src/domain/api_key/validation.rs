//! API key validation rules
//!
//! Each rule is a plain check over the proposed key that contributes zero or
//! more errors. [`validate_new_api_key`] runs all of them in order and
//! returns the parsed grants when nothing failed.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use super::entity::{ApiKeyType, NAME_DEFAULT_PUBLIC, NAME_MASTER};
use crate::domain::account::Account;
use crate::domain::grants::GrantSpec;

pub const BLANK_MESSAGE: &str = "can't be blank";
pub const TAKEN_MESSAGE: &str = "has already been taken";
pub const NOT_INCLUDED_MESSAGE: &str = "is not included in the list";
pub const OWNED_TABLES_MESSAGE: &str = "can only grant permissions over owned tables";
pub const ALL_APIS_MESSAGE: &str = "must grant all apis";

/// Attribute an error is reported against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiKeyField {
    Grants,
    Name,
    Type,
}

impl ApiKeyField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grants => "grants",
            Self::Name => "name",
            Self::Type => "type",
        }
    }
}

/// A single failed rule
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiKeyValidationError {
    #[error("grants {0}")]
    InvalidGrants(String),

    #[error("name {0}")]
    InvalidName(String),

    #[error("type {0}")]
    InvalidType(String),
}

impl ApiKeyValidationError {
    pub fn grants(message: impl Into<String>) -> Self {
        Self::InvalidGrants(message.into())
    }

    pub fn name(message: impl Into<String>) -> Self {
        Self::InvalidName(message.into())
    }

    pub fn key_type(message: impl Into<String>) -> Self {
        Self::InvalidType(message.into())
    }

    pub fn field(&self) -> ApiKeyField {
        match self {
            Self::InvalidGrants(_) => ApiKeyField::Grants,
            Self::InvalidName(_) => ApiKeyField::Name,
            Self::InvalidType(_) => ApiKeyField::Type,
        }
    }

    /// The message without the field prefix
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidGrants(m) | Self::InvalidName(m) | Self::InvalidType(m) => m,
        }
    }
}

/// Every error produced while validating one key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ApiKeyValidationError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ApiKeyValidationError) {
        self.0.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApiKeyValidationError> {
        self.0.iter()
    }

    /// Messages reported against one field
    pub fn messages_for(&self, field: ApiKeyField) -> Vec<&str> {
        self.0
            .iter()
            .filter(|e| e.field() == field)
            .map(ApiKeyValidationError::message)
            .collect()
    }

    pub fn has_errors_for(&self, field: ApiKeyField) -> bool {
        self.0.iter().any(|e| e.field() == field)
    }
}

impl From<Vec<ApiKeyValidationError>> for ValidationErrors {
    fn from(errors: Vec<ApiKeyValidationError>) -> Self {
        Self(errors)
    }
}

impl From<ApiKeyValidationError> for ValidationErrors {
    fn from(error: ApiKeyValidationError) -> Self {
        Self(vec![error])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join(", "))
    }
}

/// Uniqueness facts looked up in the repository before validation
#[derive(Debug, Clone, Copy, Default)]
pub struct UniquenessCheck {
    /// The owner already has a key with this name
    pub name_taken: bool,
    /// The owner already has a key of this type
    pub type_taken: bool,
}

/// The key as proposed by a creation request
#[derive(Debug, Clone, Copy)]
pub struct NewApiKey<'a> {
    pub key_type: ApiKeyType,
    pub name: &'a str,
    pub grants: &'a Value,
}

/// Run the full validation chain for a new key
pub fn validate_new_api_key(
    proposed: NewApiKey<'_>,
    owner: &Account,
    uniqueness: UniquenessCheck,
) -> Result<GrantSpec, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let grants = match GrantSpec::parse(proposed.grants) {
        Ok(spec) => Some(spec),
        Err(grant_errors) => {
            for error in grant_errors {
                errors.push(error);
            }
            None
        }
    };

    // Owned-table check only runs on well-formed grants
    if let Some(spec) = &grants {
        validate_owned_tables(spec, owner, &mut errors);
    }

    validate_name_presence(proposed.name, uniqueness, &mut errors);
    validate_type_uniqueness(proposed.key_type, uniqueness, &mut errors);
    validate_name_for_type(proposed.key_type, proposed.name, &mut errors);
    validate_reserved_key(proposed.key_type, proposed.name, proposed.grants, &mut errors);

    match grants {
        Some(spec) if errors.is_empty() => Ok(spec),
        _ => Err(errors),
    }
}

fn validate_name_presence(name: &str, uniqueness: UniquenessCheck, errors: &mut ValidationErrors) {
    if name.trim().is_empty() {
        errors.push(ApiKeyValidationError::name(BLANK_MESSAGE));
    } else if uniqueness.name_taken {
        errors.push(ApiKeyValidationError::name(TAKEN_MESSAGE));
    }
}

fn validate_type_uniqueness(
    key_type: ApiKeyType,
    uniqueness: UniquenessCheck,
    errors: &mut ValidationErrors,
) {
    if !key_type.is_regular() && uniqueness.type_taken {
        errors.push(ApiKeyValidationError::key_type(TAKEN_MESSAGE));
    }
}

/// The reserved names belong to their key types only
pub fn validate_name_for_type(key_type: ApiKeyType, name: &str, errors: &mut ValidationErrors) {
    let misused_master = key_type != ApiKeyType::Master && name == NAME_MASTER;
    let misused_public = key_type != ApiKeyType::DefaultPublic && name == NAME_DEFAULT_PUBLIC;

    if misused_master || misused_public {
        errors.push(ApiKeyValidationError::name(format!(
            "api_key name cannot be {} nor {}",
            NAME_MASTER, NAME_DEFAULT_PUBLIC
        )));
    }
}

fn validate_reserved_key(
    key_type: ApiKeyType,
    name: &str,
    grants: &Value,
    errors: &mut ValidationErrors,
) {
    let required_name = match key_type {
        ApiKeyType::Master => NAME_MASTER,
        ApiKeyType::DefaultPublic => NAME_DEFAULT_PUBLIC,
        ApiKeyType::Regular => return,
    };

    if name != required_name {
        errors.push(ApiKeyValidationError::name(format!(
            "must be {} for {} keys",
            required_name,
            key_type.description()
        )));
    }

    if !GrantSpec::is_all_apis(grants) {
        errors.push(ApiKeyValidationError::grants(ALL_APIS_MESSAGE));
    }
}

fn validate_owned_tables(grants: &GrantSpec, owner: &Account, errors: &mut ValidationErrors) {
    let foreign = grants
        .table_permissions()
        .iter()
        .any(|table| table.schema() != owner.database_schema());

    if foreign {
        errors.push(ApiKeyValidationError::grants(OWNED_TABLES_MESSAGE));
    }
}
