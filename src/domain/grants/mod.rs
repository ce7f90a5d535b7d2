//! Grants domain
//!
//! Parsing of the grants payload and the per-table permission model derived
//! from it.

mod permissions;
mod spec;

pub use permissions::{
    is_table_privilege, PermissionSet, TablePermissions, TABLE_PRIVILEGES, WRITE_PERMISSIONS,
};
pub use spec::{
    Api, GrantSection, GrantSpec, TableGrant, APIS_REQUIRED_MESSAGE, NOT_AN_ARRAY_MESSAGE,
    ONE_APIS_SECTION_MESSAGE, ONE_DATABASE_SECTION_MESSAGE,
};
