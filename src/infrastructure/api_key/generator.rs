//! Credential generation
//!
//! Mints the token, database role name and role password of regular keys.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use tracing::debug;

use crate::domain::api_key::{CredentialLookup, KeyCredentials};
use crate::domain::DomainError;

/// Longest identifier PostgreSQL keeps without truncation
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

const ROLE_SUFFIX_BYTES: usize = 16;

/// Make `raw` safe as an unquoted-style role name.
///
/// Lower-cases, replaces anything outside `[a-z0-9_]` with `_` and trims the
/// head so the result fits in [`MAX_IDENTIFIER_LENGTH`], keeping the tail
/// (where the random suffix lives) intact.
pub fn sanitize_identifier(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' { c } else { '_' })
        .collect();

    if sanitized.len() <= MAX_IDENTIFIER_LENGTH {
        return sanitized;
    }

    sanitized[sanitized.len() - MAX_IDENTIFIER_LENGTH..].to_string()
}

/// Generator for key secrets
#[derive(Debug, Clone)]
pub struct CredentialGenerator {
    /// Random bytes behind each token
    token_bytes: usize,
    /// Random bytes behind each password (hex doubles the length)
    password_bytes: usize,
    /// Lookups attempted before giving up on a unique value
    max_attempts: usize,
}

impl Default for CredentialGenerator {
    fn default() -> Self {
        Self {
            token_bytes: 32,
            password_bytes: 20,
            max_attempts: 10,
        }
    }
}

impl CredentialGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_bytes(mut self, bytes: usize) -> Self {
        self.token_bytes = bytes;
        self
    }

    pub fn with_password_bytes(mut self, bytes: usize) -> Self {
        self.password_bytes = bytes;
        self
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// A fresh URL-safe token, not checked for collisions
    pub fn random_token(&self) -> String {
        URL_SAFE_NO_PAD.encode(random_bytes(self.token_bytes))
    }

    /// A fresh hex password
    pub fn random_password(&self) -> String {
        hex::encode(random_bytes(self.password_bytes))
    }

    /// A fresh role name for `username`, not checked for collisions
    pub fn random_role_name(&self, username: &str) -> String {
        sanitize_identifier(&format!(
            "{}_role_{}",
            username,
            hex::encode(random_bytes(ROLE_SUFFIX_BYTES))
        ))
    }

    /// A token no existing key holds
    pub async fn unique_token(&self, lookup: &dyn CredentialLookup) -> Result<String, DomainError> {
        for attempt in 1..=self.max_attempts {
            let token = self.random_token();

            if !lookup.token_exists(&token).await? {
                return Ok(token);
            }

            debug!(attempt, "Generated token already in use, retrying");
        }

        Err(DomainError::internal(format!(
            "Could not generate a unique token after {} attempts",
            self.max_attempts
        )))
    }

    /// A role name no existing key holds
    pub async fn unique_db_role(
        &self,
        username: &str,
        lookup: &dyn CredentialLookup,
    ) -> Result<String, DomainError> {
        for attempt in 1..=self.max_attempts {
            let role = self.random_role_name(username);

            if !lookup.db_role_exists(&role).await? {
                return Ok(role);
            }

            debug!(attempt, "Generated role name already in use, retrying");
        }

        Err(DomainError::internal(format!(
            "Could not generate a unique database role after {} attempts",
            self.max_attempts
        )))
    }

    /// Token, role and password for a new regular key
    pub async fn regular_credentials(
        &self,
        username: &str,
        lookup: &dyn CredentialLookup,
    ) -> Result<KeyCredentials, DomainError> {
        let token = self.unique_token(lookup).await?;
        let db_role = self.unique_db_role(username, lookup).await?;

        Ok(KeyCredentials::new(token, db_role, self.random_password()))
    }
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}
