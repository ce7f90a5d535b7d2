//! Privilege-management command descriptors

use std::fmt;

/// Quote an SQL identifier, doubling embedded double quotes
pub fn quote_ident(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quote an SQL string literal, doubling embedded single quotes
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// One statement of a provisioning or teardown sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivilegeCommand {
    CreateRole { role: String, password: String },
    GrantRole { granted: String, role: String },
    SetSearchPath { role: String, search_path: String },
    GrantTable {
        schema: String,
        table: String,
        permissions: Vec<String>,
        role: String,
    },
    GrantSchemaUsage { schema: String, role: String },
    GrantSequenceUsage { schema: String, role: String },
    RevokeAllTables { schema: String, role: String },
    RevokeSchemaUsage { schema: String, role: String },
    RevokeSequenceUsage { schema: String, role: String },
    DropRole { role: String },
}

impl PrivilegeCommand {
    /// Render the statement sent to the database
    pub fn to_sql(&self) -> String {
        self.render(false)
    }

    /// Role the statement applies to
    pub fn role(&self) -> &str {
        match self {
            Self::CreateRole { role, .. }
            | Self::GrantRole { role, .. }
            | Self::SetSearchPath { role, .. }
            | Self::GrantTable { role, .. }
            | Self::GrantSchemaUsage { role, .. }
            | Self::GrantSequenceUsage { role, .. }
            | Self::RevokeAllTables { role, .. }
            | Self::RevokeSchemaUsage { role, .. }
            | Self::RevokeSequenceUsage { role, .. }
            | Self::DropRole { role } => role,
        }
    }

    fn render(&self, redact: bool) -> String {
        match self {
            Self::CreateRole { role, password } => format!(
                "CREATE ROLE {} NOSUPERUSER NOCREATEDB LOGIN ENCRYPTED PASSWORD {}",
                quote_ident(role),
                if redact {
                    "'********'".to_string()
                } else {
                    quote_literal(password)
                }
            ),
            Self::GrantRole { granted, role } => {
                format!("GRANT {} TO {}", quote_ident(granted), quote_ident(role))
            }
            Self::SetSearchPath { role, search_path } => {
                format!("ALTER ROLE {} SET search_path TO {}", quote_ident(role), search_path)
            }
            Self::GrantTable {
                schema,
                table,
                permissions,
                role,
            } => format!(
                "GRANT {} ON TABLE {}.{} TO {}",
                permissions.join(", "),
                quote_ident(schema),
                quote_ident(table),
                quote_ident(role)
            ),
            Self::GrantSchemaUsage { schema, role } => format!(
                "GRANT USAGE ON SCHEMA {} TO {}",
                quote_ident(schema),
                quote_ident(role)
            ),
            Self::GrantSequenceUsage { schema, role } => format!(
                "GRANT USAGE, SELECT ON ALL SEQUENCES IN SCHEMA {} TO {}",
                quote_ident(schema),
                quote_ident(role)
            ),
            Self::RevokeAllTables { schema, role } => format!(
                "REVOKE ALL PRIVILEGES ON ALL TABLES IN SCHEMA {} FROM {}",
                quote_ident(schema),
                quote_ident(role)
            ),
            Self::RevokeSchemaUsage { schema, role } => format!(
                "REVOKE USAGE ON SCHEMA {} FROM {}",
                quote_ident(schema),
                quote_ident(role)
            ),
            Self::RevokeSequenceUsage { schema, role } => format!(
                "REVOKE USAGE, SELECT ON ALL SEQUENCES IN SCHEMA {} FROM {}",
                quote_ident(schema),
                quote_ident(role)
            ),
            Self::DropRole { role } => format!("DROP ROLE {}", quote_ident(role)),
        }
    }
}

/// Displays the statement with the password masked, for logs
impl fmt::Display for PrivilegeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(true))
    }
}
