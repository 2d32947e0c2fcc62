//! The blob half of the storage service: a flat, lock-mediated object
//! store on local disk. See [`session::BlobStore`] for the session type
//! that a [`crate::unit_of_work::UnitOfWork`] pairs with a metadata
//! transaction.

mod lock;
mod session;

pub use lock::LockMode;
pub use session::BlobStore;
