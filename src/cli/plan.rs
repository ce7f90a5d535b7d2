//! Plan command - shows the provisioning statements of a grants document

use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use crate::config::AppConfig;
use crate::domain::api_key::{
    validate_new_api_key, ApiKey, ApiKeyType, KeyCredentials, NewApiKey, UniquenessCheck,
};
use crate::domain::provisioning::{creation_plan, PrivilegeCommand};
use crate::domain::{Account, DomainError};

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// TOML file describing the owning account
    #[arg(long)]
    pub account: PathBuf,

    /// JSON file with the grants document
    #[arg(long)]
    pub grants: PathBuf,

    /// Key name used for validation
    #[arg(long, default_value = "plan")]
    pub name: String,
}

pub async fn run(args: PlanArgs, config: &AppConfig) -> anyhow::Result<()> {
    let account = super::load_account(&args.account)?;
    let grants = super::load_grants(&args.grants)?;

    for command in plan_statements(&account, &args.name, &grants, config)? {
        println!("{};", command);
    }

    Ok(())
}

/// Validate `grants` for `owner` and build the creation sequence of a fresh key
pub fn plan_statements(
    owner: &Account,
    name: &str,
    grants: &serde_json::Value,
    config: &AppConfig,
) -> anyhow::Result<Vec<PrivilegeCommand>> {
    let proposed = NewApiKey {
        key_type: ApiKeyType::Regular,
        name,
        grants,
    };
    let spec = validate_new_api_key(proposed, owner, UniquenessCheck::default())
        .map_err(DomainError::from)?;
    spec.granted_apis()?;

    let generator = config.credentials.generator();
    let credentials = KeyCredentials::new(
        generator.random_token(),
        generator.random_role_name(owner.username()),
        generator.random_password(),
    );

    let key = ApiKey::new(*owner.id(), ApiKeyType::Regular, name, spec, credentials);
    debug!(role = %key.db_role(), "Planning provisioning");

    Ok(creation_plan(&key, owner))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AccountId;
    use serde_json::json;

    fn owner() -> Account {
        Account::new(AccountId::new(), "alice")
    }

    #[test]
    fn test_plan_masks_password() {
        let grants = json!([
            {"type": "apis", "apis": ["sql"]},
            {"type": "database", "tables": [
                {"schema": "alice", "name": "t1", "permissions": ["select"]}
            ]}
        ]);

        let commands = plan_statements(&owner(), "plan", &grants, &AppConfig::default()).unwrap();

        assert_eq!(commands.len(), 6);
        assert!(commands[0].to_string().ends_with("PASSWORD '********'"));
    }

    #[test]
    fn test_plan_rejects_foreign_schema() {
        let grants = json!([
            {"type": "apis", "apis": ["sql"]},
            {"type": "database", "tables": [
                {"schema": "bob", "name": "t1", "permissions": ["select"]}
            ]}
        ]);

        let err = plan_statements(&owner(), "plan", &grants, &AppConfig::default()).unwrap_err();

        assert!(err
            .to_string()
            .contains("can only grant permissions over owned tables"));
    }
}
