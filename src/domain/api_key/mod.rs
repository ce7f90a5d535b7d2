//! API Key domain
//!
//! This module provides the API key aggregate, its validation rules and the
//! repository contract used to persist it.

mod entity;
mod repository;
mod validation;

pub use entity::{
    ApiKey, ApiKeyId, ApiKeyType, KeyCredentials, NAME_DEFAULT_PUBLIC, NAME_MASTER,
    TOKEN_DEFAULT_PUBLIC,
};
pub use repository::{
    ApiKeyRepository, CredentialLookup, DB_ROLE_CONSTRAINT, OWNER_NAME_CONSTRAINT,
    OWNER_TYPE_CONSTRAINT, TOKEN_CONSTRAINT,
};
pub use validation::{
    validate_name_for_type, validate_new_api_key, ApiKeyField, ApiKeyValidationError, NewApiKey,
    UniquenessCheck, ValidationErrors, ALL_APIS_MESSAGE, BLANK_MESSAGE, NOT_INCLUDED_MESSAGE,
    OWNED_TABLES_MESSAGE, TAKEN_MESSAGE,
};
