//! Binds one [`MetaStore`] transaction to one [`BlobStore`] session for
//! the lifetime of a single request and enforces a coordinated commit
//! order: metadata commits first, the blob store second; the metadata
//! row is the source of truth if the two diverge.

use log::error;

use crate::blobstore::BlobStore;
use crate::config::Config;
use crate::errors::*;
use crate::metastore::{DbPool, MetaStore};

pub struct UnitOfWork {
    meta: MetaStore,
    blob: BlobStore,
}

impl UnitOfWork {
    /// Opens a fresh metadata transaction and blob session for one
    /// request. Orphan-staging-file recovery is a process-wide startup
    /// step (see `BlobStore::recover`), not repeated here.
    pub fn begin(pool: &DbPool, config: &Config) -> Result<UnitOfWork> {
        let meta = MetaStore::begin(pool)?;
        let blob = BlobStore::open(
            &config.file_storage_path,
            &config.pending_file_prefix,
            config.lock_timeout,
        )?;
        Ok(UnitOfWork { meta, blob })
    }

    pub fn meta(&mut self) -> &mut MetaStore {
        &mut self.meta
    }

    pub fn blob(&mut self) -> &mut BlobStore {
        &mut self.blob
    }

    /// Commits metadata, then the blob store. If the metadata commit
    /// fails, the blob session is rolled back and the error surfaces. If
    /// metadata commits but the blob store then fails, the database is
    /// already durable — the error still surfaces to the caller, but
    /// repairing the resulting drift is `sync_storage_with_db`'s job, not
    /// this method's.
    pub fn commit(self) -> Result<()> {
        match self.meta.commit() {
            Ok(()) => self.blob.commit().map_err(|e| {
                error!(
                    "blob store commit failed after metadata already committed; \
                     run synchronise to repair the drift: {}",
                    e
                );
                e
            }),
            Err(e) => {
                self.blob.rollback();
                Err(e)
            }
        }
    }

    /// Rolls back both sides. Neither half is allowed to raise: failures
    /// are logged and swallowed.
    pub fn rollback(self) {
        self.meta.rollback();
        self.blob.rollback();
    }
}
