//! Database-backed API keys
//!
//! Issues API keys for an account and gives each regular key its own
//! database role with:
//! - Grants documents validated against the account's owned schema
//! - Role provisioning and teardown through plain SQL
//! - A token-keyed cache entry for request authorization

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
