//! CLI module for db-api-keys
//!
//! Provides subcommands for managing the API keys of one account:
//! - `plan`: validate grants and print the provisioning statements, no side effects
//! - `create-master`, `create-public`, `create`: issue keys
//! - `list`, `rotate`, `delete`, `grants`: manage issued keys

pub mod keys;
pub mod plan;

use std::path::Path;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::domain::account::Account;
use crate::infrastructure::logging;

/// db-api-keys - Issue API keys backed by dedicated database roles
#[derive(Parser)]
#[command(name = "db-api-keys")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the statements that would provision a key with the given grants
    Plan(plan::PlanArgs),

    /// Create the account's master key
    CreateMaster(keys::AccountArgs),

    /// Create the account's default public key
    CreatePublic(keys::AccountArgs),

    /// Create a regular key and provision its database role
    Create(keys::CreateArgs),

    /// List the account's keys
    List(keys::AccountArgs),

    /// Regenerate a key's token
    Rotate(keys::KeyArgs),

    /// Delete a regular key and drop its database role
    Delete(keys::KeyArgs),

    /// Show the table privileges a key's role holds in the database
    Grants(keys::KeyArgs),
}

/// Run a parsed command
pub async fn run(command: Command) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    logging::init_logging(&config.logging);

    match command {
        Command::Plan(args) => plan::run(args, &config).await,
        Command::CreateMaster(args) => keys::create_master(args, &config).await,
        Command::CreatePublic(args) => keys::create_public(args, &config).await,
        Command::Create(args) => keys::create(args, &config).await,
        Command::List(args) => keys::list(args, &config).await,
        Command::Rotate(args) => keys::rotate(args, &config).await,
        Command::Delete(args) => keys::delete(args, &config).await,
        Command::Grants(args) => keys::grants(args, &config).await,
    }
}

/// Read an account description from a TOML file
pub fn load_account(path: &Path) -> anyhow::Result<Account> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read account file {}", path.display()))?;

    toml::from_str(&raw).with_context(|| format!("Invalid account file {}", path.display()))
}

/// Read a grants document from a JSON file
pub fn load_grants(path: &Path) -> anyhow::Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read grants file {}", path.display()))?;

    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}
