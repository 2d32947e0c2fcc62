//! Crate-wide error type.
//!
//! One `error_chain!` hierarchy for the whole core. `ErrorKind` is the
//! taxonomy from the design: the HTTP layer is the only place that
//! translates a kind into a status code.

error_chain! {
    foreign_links {
        Io(::std::io::Error);
        Db(::diesel::result::Error);
        Pool(::diesel::r2d2::PoolError);
    }

    errors {
        /// Malformed filename/extension/path, missing form fields.
        Validation(msg: String) {
            description("validation error")
            display("validation error: {}", msg)
        }

        /// Metadata id unknown, or blob missing while metadata is present.
        NotFound(msg: String) {
            description("not found")
            display("not found: {}", msg)
        }

        /// Uniqueness collision on create or rename.
        AlreadyExists(msg: String) {
            description("already exists")
            display("already exists: {}", msg)
        }

        /// A blob lock could not be acquired within the configured timeout.
        LockTimeout(id: String) {
            description("lock timeout")
            display("timed out waiting for a lock on '{}'", id)
        }

        /// Storage directory unreadable, disk full, permissions, etc.
        BlobStoreUnavailable(msg: String) {
            description("blob store unavailable")
            display("blob store unavailable: {}", msg)
        }

        /// Write or rename failed mid-commit. Reconciliation is advised.
        BlobWriteFailed(msg: String) {
            description("blob write failed")
            display("blob write failed: {} (run synchronise to repair drift)", msg)
        }
    }
}

impl Error {
    /// True if this is safe for a client to retry as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::LockTimeout(_))
    }
}
