//! Table permission aggregation

use serde::{Deserialize, Serialize};

/// Privileges that let a role modify table contents
pub const WRITE_PERMISSIONS: [&str; 4] = ["insert", "update", "delete", "truncate"];

/// Table privileges accepted in a database grant
pub const TABLE_PRIVILEGES: [&str; 7] = [
    "select",
    "insert",
    "update",
    "delete",
    "truncate",
    "references",
    "trigger",
];

/// Check whether a permission names a known table privilege (case-insensitive)
pub fn is_table_privilege(permission: &str) -> bool {
    let lowered = permission.to_lowercase();
    TABLE_PRIVILEGES.contains(&lowered.as_str())
}

/// Normalized set of permission strings.
///
/// Insertion order is kept so generated statements are stable, but equality
/// and membership treat it as a set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(Vec<String>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add permissions, lower-casing them and skipping ones already present
    pub fn extend<I, S>(&mut self, permissions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for permission in permissions {
            let lowered = permission.as_ref().to_lowercase();
            if !self.0.contains(&lowered) {
                self.0.push(lowered);
            }
        }
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.iter().any(|p| p == permission)
    }

    /// True if any write privilege is present
    pub fn is_write(&self) -> bool {
        WRITE_PERMISSIONS.iter().any(|w| self.contains(w))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl PartialEq for PermissionSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|p| other.contains(p))
    }
}

impl Eq for PermissionSet {}

impl<S: AsRef<str>> FromIterator<S> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

/// Merged permissions for one `schema.table`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TablePermissions {
    schema: String,
    name: String,
    permissions: PermissionSet,
}

impl TablePermissions {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            permissions: PermissionSet::new(),
        }
    }

    /// Build from an already known list (e.g. live grants read back from the database)
    pub fn with_permissions<I, S>(schema: impl Into<String>, name: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut table = Self::new(schema, name);
        table.merge(permissions);
        table
    }

    /// Identifier used to aggregate grants: `schema.name`
    pub fn table_id(&self) -> String {
        table_id(&self.schema, &self.name)
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn permissions(&self) -> &PermissionSet {
        &self.permissions
    }

    /// Union the given permissions into this table's set
    pub fn merge<I, S>(&mut self, permissions: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.permissions.extend(permissions);
    }

    pub fn is_write(&self) -> bool {
        self.permissions.is_write()
    }
}

pub(crate) fn table_id(schema: &str, name: &str) -> String {
    format!("{}.{}", schema, name)
}
