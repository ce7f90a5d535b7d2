//! Database role provisioning adapters

mod dry_run;
mod postgres;
mod provisioner;

pub use dry_run::DryRunSqlExecutor;
pub use postgres::{PostgresConfig, PostgresSqlExecutor};
pub use provisioner::{extract_error_message, RoleProvisioner, UNEXPECTED_ERROR_MESSAGE};
