//! API Key infrastructure implementations
//!
//! This module provides credential generation, storage, cache projection
//! and the lifecycle service for API keys.

mod cache_sync;
mod generator;
mod postgres_repository;
mod repository;
mod service;

pub use cache_sync::{cache_fields, cache_key, CacheSync};
pub use generator::{sanitize_identifier, CredentialGenerator, MAX_IDENTIFIER_LENGTH};
pub use postgres_repository::PostgresApiKeyRepository;
pub use repository::InMemoryApiKeyRepository;
pub use service::{ApiKeySettings, ApiKeyService};
