//! The metadata half of the storage service: typed CRUD over `file_meta`
//! inside one Postgres transaction per request. See
//! [`session::MetaStore`].

pub mod models;
pub mod schema;
mod session;

pub use session::{build_pool, build_pool_with_retry, DbPool, MetaStore};
