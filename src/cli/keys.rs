//! Key management commands backed by PostgreSQL and the configured cache

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use serde_json::json;
use tracing::info;

use crate::config::AppConfig;
use crate::domain::{ApiKey, ApiKeyId};
use crate::infrastructure::api_key::{ApiKeyService, CacheSync, PostgresApiKeyRepository};
use crate::infrastructure::cache::CacheFactory;
use crate::infrastructure::provisioning::{PostgresSqlExecutor, RoleProvisioner};

#[derive(Args, Debug)]
pub struct AccountArgs {
    /// TOML file describing the owning account
    #[arg(long)]
    pub account: PathBuf,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub account: AccountArgs,

    /// Name of the new key
    #[arg(long)]
    pub name: String,

    /// JSON file with the grants document
    #[arg(long)]
    pub grants: PathBuf,
}

#[derive(Args, Debug)]
pub struct KeyArgs {
    #[command(flatten)]
    pub account: AccountArgs,

    /// Id of the key
    #[arg(long)]
    pub id: ApiKeyId,
}

type Service = ApiKeyService<PostgresApiKeyRepository>;

async fn connect(config: &AppConfig) -> anyhow::Result<Service> {
    let pool = config.database.postgres().connect().await?;

    let repository = Arc::new(PostgresApiKeyRepository::new(pool.clone()));
    repository.ensure_table().await?;

    let cache = CacheFactory::new().create(&config.cache).await?;
    let provisioner = RoleProvisioner::new(Arc::new(PostgresSqlExecutor::new(pool)));

    info!("Connected to database, cache backend: {}", config.cache.cache_type);

    Ok(ApiKeyService::new(repository, provisioner, CacheSync::new(cache))
        .with_generator(config.credentials.generator())
        .with_settings(config.credentials.settings()))
}

/// Operator-facing view of a key; the token is shown, the role password is not
fn summary(key: &ApiKey) -> serde_json::Value {
    json!({
        "id": key.id(),
        "type": key.key_type(),
        "name": key.name(),
        "token": key.token(),
        "database_role": key.db_role(),
        "grants": key.grants(),
        "created_at": key.created_at(),
    })
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn create_master(args: AccountArgs, config: &AppConfig) -> anyhow::Result<()> {
    let account = super::load_account(&args.account)?;
    let service = connect(config).await?;

    let key = service.create_master_key(&account).await?;
    print_json(&summary(&key))
}

pub async fn create_public(args: AccountArgs, config: &AppConfig) -> anyhow::Result<()> {
    let account = super::load_account(&args.account)?;
    let service = connect(config).await?;

    let key = service.create_default_public_key(&account).await?;
    print_json(&summary(&key))
}

pub async fn create(args: CreateArgs, config: &AppConfig) -> anyhow::Result<()> {
    let account = super::load_account(&args.account.account)?;
    let grants = super::load_grants(&args.grants)?;
    let service = connect(config).await?;

    let key = service
        .create_regular_key(&account, &args.name, &grants)
        .await?;
    print_json(&summary(&key))
}

pub async fn list(args: AccountArgs, config: &AppConfig) -> anyhow::Result<()> {
    let account = super::load_account(&args.account)?;
    let service = connect(config).await?;

    let keys: Vec<serde_json::Value> = service
        .list_for_owner(&account)
        .await?
        .iter()
        .map(summary)
        .collect();
    print_json(&serde_json::Value::Array(keys))
}

pub async fn rotate(args: KeyArgs, config: &AppConfig) -> anyhow::Result<()> {
    let account = super::load_account(&args.account.account)?;
    let service = connect(config).await?;

    let key = service.regenerate_token(&args.id, &account).await?;
    print_json(&summary(&key))
}

pub async fn delete(args: KeyArgs, config: &AppConfig) -> anyhow::Result<()> {
    let account = super::load_account(&args.account.account)?;
    let service = connect(config).await?;

    service.delete(&args.id, &account).await?;
    println!("Deleted API key {}", args.id);
    Ok(())
}

pub async fn grants(args: KeyArgs, config: &AppConfig) -> anyhow::Result<()> {
    let account = super::load_account(&args.account.account)?;
    let service = connect(config).await?;

    let tables = service.table_permissions_from_db(&args.id, &account).await?;
    print_json(&serde_json::to_value(tables)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::api_key::KeyCredentials;
    use crate::domain::{AccountId, ApiKeyType, GrantSpec};

    #[test]
    fn test_summary_hides_role_password() {
        let key = ApiKey::new(
            AccountId::new(),
            ApiKeyType::Master,
            "Master",
            GrantSpec::all_apis(),
            KeyCredentials::new("tok", "alice_owner", "hunter2"),
        );

        let value = summary(&key);

        assert_eq!(value["type"], "master");
        assert_eq!(value["token"], "tok");
        assert_eq!(value["database_role"], "alice_owner");
        assert!(!value.to_string().contains("hunter2"));
    }
}
