//! Core library for the content-addressed file storage service: a
//! transactional unit of work coordinating a metadata database and a
//! flat, lock-mediated blob store on local disk.
//!
//! The HTTP surface in [`http`] is a thin adapter; everything it needs is
//! exposed here so the core stays testable without a running server.

#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate diesel;

pub mod blobstore;
pub mod config;
pub mod errors;
pub mod http;
pub mod metastore;
pub mod service;
pub mod unit_of_work;
pub mod validation;

pub use config::Config;
pub use errors::{Error, ErrorKind, Result};
pub use service::FileHolderService;
pub use unit_of_work::UnitOfWork;
