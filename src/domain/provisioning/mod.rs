//! Provisioning domain
//!
//! Database role provisioning is modeled as data: a key and its owner map to
//! an ordered list of [`PrivilegeCommand`]s, executed elsewhere through a
//! [`SqlExecutor`].

mod command;
mod executor;
mod plan;

pub use command::{quote_ident, quote_literal, PrivilegeCommand};
pub use executor::{RoleTableGrant, SqlExecutionError, SqlExecutor};
pub use plan::{creation_plan, teardown_plan};

#[cfg(test)]
pub use executor::MockSqlExecutor;
