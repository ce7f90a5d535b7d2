//! Cache domain - key-value caching abstraction

mod repository;

pub use repository::{Cache, CacheFields};

#[cfg(test)]
pub use repository::mock::{CacheOp, MockCache};
