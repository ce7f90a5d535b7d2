//! Provisioning and teardown sequences for a key's database role

use super::command::PrivilegeCommand;
use crate::domain::account::Account;
use crate::domain::api_key::ApiKey;

/// Statements that create and grant the role of a regular key, in order
pub fn creation_plan(key: &ApiKey, owner: &Account) -> Vec<PrivilegeCommand> {
    let role = key.db_role().to_string();

    let mut commands = vec![
        PrivilegeCommand::CreateRole {
            role: role.clone(),
            password: key.db_password().to_string(),
        },
        PrivilegeCommand::GrantRole {
            granted: owner.database_public_username().to_string(),
            role: role.clone(),
        },
        PrivilegeCommand::SetSearchPath {
            role: role.clone(),
            search_path: owner.search_path(),
        },
    ];

    if let Some(member_role) = owner.organization_member_role() {
        commands.push(PrivilegeCommand::GrantRole {
            granted: member_role.to_string(),
            role: role.clone(),
        });
    }

    let mut granted_schemas: Vec<String> = Vec::new();

    for table in key.table_permissions() {
        if table.permissions().is_empty() {
            continue;
        }

        commands.push(PrivilegeCommand::GrantTable {
            schema: table.schema().to_string(),
            table: table.name().to_string(),
            permissions: table.permissions().as_slice().to_vec(),
            role: role.clone(),
        });

        if !granted_schemas.iter().any(|s| s == table.schema()) {
            granted_schemas.push(table.schema().to_string());
        }
    }

    for schema in granted_schemas {
        commands.push(PrivilegeCommand::GrantSchemaUsage {
            schema: schema.clone(),
            role: role.clone(),
        });
        commands.push(PrivilegeCommand::GrantSequenceUsage {
            schema,
            role: role.clone(),
        });
    }

    commands
}

/// Statements that strip a role's privileges on the given schemas and drop it
pub fn teardown_plan(role: &str, schemas: &[String]) -> Vec<PrivilegeCommand> {
    let mut commands = Vec::with_capacity(schemas.len() * 3 + 1);
    let mut seen: Vec<&str> = Vec::new();

    for schema in schemas {
        if seen.contains(&schema.as_str()) {
            continue;
        }
        seen.push(schema);

        commands.push(PrivilegeCommand::RevokeAllTables {
            schema: schema.clone(),
            role: role.to_string(),
        });
        commands.push(PrivilegeCommand::RevokeSchemaUsage {
            schema: schema.clone(),
            role: role.to_string(),
        });
        commands.push(PrivilegeCommand::RevokeSequenceUsage {
            schema: schema.clone(),
            role: role.to_string(),
        });
    }

    commands.push(PrivilegeCommand::DropRole {
        role: role.to_string(),
    });

    commands
}
