//! Grant specification: the declarative `apis` / `database` payload of a key

use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use super::permissions::{is_table_privilege, table_id, TablePermissions};
use crate::domain::api_key::ApiKeyValidationError;
use crate::domain::DomainError;

const APIS_TYPE: &str = "apis";
const DATABASE_TYPE: &str = "database";

pub const NOT_AN_ARRAY_MESSAGE: &str = "has to be an array";
pub const ONE_APIS_SECTION_MESSAGE: &str = "only one apis section is allowed";
pub const ONE_DATABASE_SECTION_MESSAGE: &str = "only one database section is allowed";
pub const APIS_REQUIRED_MESSAGE: &str = "apis array is needed for type \"apis\"";

/// An API that a key can be granted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Api {
    Sql,
    Maps,
}

impl Api {
    pub const ALL: [Api; 2] = [Api::Sql, Api::Maps];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Maps => "maps",
        }
    }
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One table entry of a `database` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableGrant {
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl TableGrant {
    pub fn new<I, S>(schema: impl Into<String>, name: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schema: schema.into(),
            name: name.into(),
            permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }
}

/// A tagged section of the grants payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum GrantSection {
    Apis {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        apis: Option<Vec<Api>>,
    },
    Database {
        #[serde(default)]
        tables: Vec<TableGrant>,
    },
}

impl GrantSection {
    pub fn apis(apis: impl IntoIterator<Item = Api>) -> Self {
        Self::Apis {
            apis: Some(apis.into_iter().collect()),
        }
    }

    pub fn database(tables: impl IntoIterator<Item = TableGrant>) -> Self {
        Self::Database {
            tables: tables.into_iter().collect(),
        }
    }
}

/// Parsed grants of an API key.
///
/// `granted_apis` and `table_permissions` are computed on first access and
/// memoized; grants never change after a key is built.
#[derive(Clone)]
pub struct GrantSpec {
    sections: Vec<GrantSection>,
    granted_apis: OnceLock<Option<Vec<Api>>>,
    table_permissions: OnceLock<Vec<TablePermissions>>,
}

impl GrantSpec {
    pub fn from_sections(sections: Vec<GrantSection>) -> Self {
        Self {
            sections,
            granted_apis: OnceLock::new(),
            table_permissions: OnceLock::new(),
        }
    }

    /// Grants required for master and default public keys
    pub fn all_apis() -> Self {
        Self::from_sections(vec![GrantSection::apis(Api::ALL)])
    }

    /// Parse and validate a raw grants payload.
    ///
    /// Every rule violation is collected; an empty error list means the
    /// payload is usable. The `apis` field itself is only checked when
    /// [`GrantSpec::granted_apis`] is called.
    pub fn parse(value: &Value) -> Result<Self, Vec<ApiKeyValidationError>> {
        let Some(items) = value.as_array() else {
            return Err(vec![ApiKeyValidationError::grants(NOT_AN_ARRAY_MESSAGE)]);
        };

        let mut errors = Vec::new();

        if count_sections(items, APIS_TYPE) != 1 {
            errors.push(ApiKeyValidationError::grants(ONE_APIS_SECTION_MESSAGE));
        }

        if count_sections(items, DATABASE_TYPE) > 1 {
            errors.push(ApiKeyValidationError::grants(ONE_DATABASE_SECTION_MESSAGE));
        }

        let mut sections = Vec::with_capacity(items.len());

        for (position, item) in items.iter().enumerate() {
            match GrantSection::deserialize(item) {
                Ok(section) => sections.push(section),
                Err(e) => errors.push(ApiKeyValidationError::grants(format!(
                    "has an invalid section at position {}: {}",
                    position, e
                ))),
            }
        }

        for section in &sections {
            if let GrantSection::Database { tables } = section {
                errors.extend(check_table_grants(tables));
            }
        }

        if errors.is_empty() {
            Ok(Self::from_sections(sections))
        } else {
            Err(errors)
        }
    }

    pub fn sections(&self) -> &[GrantSection] {
        &self.sections
    }

    /// Names of the granted APIs
    pub fn granted_apis(&self) -> Result<&[Api], DomainError> {
        self.granted_apis
            .get_or_init(|| {
                self.sections.iter().find_map(|section| match section {
                    GrantSection::Apis { apis } => Some(apis.clone()),
                    GrantSection::Database { .. } => None,
                })
                .flatten()
            })
            .as_deref()
            .ok_or_else(|| DomainError::unprocessable(APIS_REQUIRED_MESSAGE))
    }

    /// Per-table merged permissions, in first-seen order
    pub fn table_permissions(&self) -> &[TablePermissions] {
        self.table_permissions
            .get_or_init(|| self.build_table_permissions())
    }

    /// Distinct schemas touched by table grants
    pub fn affected_schemas(&self) -> Vec<String> {
        let mut schemas: Vec<String> = Vec::new();

        for table in self.table_permissions() {
            if !schemas.iter().any(|s| s == table.schema()) {
                schemas.push(table.schema().to_string());
            }
        }

        schemas
    }

    /// Whether a raw payload is exactly the canonical all-APIs value
    pub fn is_all_apis(value: &Value) -> bool {
        *value == Self::all_apis().to_value()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.sections).unwrap_or(Value::Array(Vec::new()))
    }

    fn build_table_permissions(&self) -> Vec<TablePermissions> {
        let Some(tables) = self.sections.iter().find_map(|section| match section {
            GrantSection::Database { tables } => Some(tables),
            GrantSection::Apis { .. } => None,
        }) else {
            return Vec::new();
        };

        let mut merged: Vec<TablePermissions> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for grant in tables {
            let id = table_id(&grant.schema, &grant.name);
            let position = *index.entry(id).or_insert_with(|| {
                merged.push(TablePermissions::new(&grant.schema, &grant.name));
                merged.len() - 1
            });
            merged[position].merge(&grant.permissions);
        }

        merged
    }
}

fn count_sections(items: &[Value], section_type: &str) -> usize {
    items
        .iter()
        .filter(|item| item.get("type").and_then(Value::as_str) == Some(section_type))
        .count()
}

fn check_table_grants(tables: &[TableGrant]) -> Vec<ApiKeyValidationError> {
    let mut errors = Vec::new();

    for table in tables {
        if table.schema.is_empty() || table.name.is_empty() {
            errors.push(ApiKeyValidationError::grants(
                "table grants need a schema and a name",
            ));
        }

        for permission in &table.permissions {
            if !is_table_privilege(permission) {
                errors.push(ApiKeyValidationError::grants(format!(
                    "invalid permission '{}'",
                    permission
                )));
            }
        }
    }

    errors
}

impl PartialEq for GrantSpec {
    fn eq(&self, other: &Self) -> bool {
        self.sections == other.sections
    }
}

impl Eq for GrantSpec {}

impl fmt::Debug for GrantSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantSpec")
            .field("sections", &self.sections)
            .finish()
    }
}

impl Serialize for GrantSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.sections.serialize(serializer)
    }
}
