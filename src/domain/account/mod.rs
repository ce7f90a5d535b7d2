//! Account domain
//!
//! The key owner as seen by this crate: identity plus the database
//! credentials and roles the owning account already has.

mod entity;

pub use entity::{Account, AccountId};
