//! Per-blob advisory file locks.
//!
//! File-backed via `fs2::FileExt::try_lock_exclusive`/`try_lock_shared`
//! so the lock is visible to other processes touching the same storage
//! directory, not just other threads in this one.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::errors::*;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// A held lock on one id's `.lock` side file. Dropping it releases the
/// underlying OS lock and closes the file.
pub struct BlobLock {
    file: File,
    mode: LockMode,
}

impl BlobLock {
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Opens (creating if needed) the lock side file for `id` under `dir`
    /// and blocks, retrying every 100ms, until `mode` can be acquired or
    /// `timeout` elapses.
    pub fn acquire(dir: &Path, id: &str, mode: LockMode, timeout: Duration) -> Result<BlobLock> {
        let path = dir.join(format!("{}.lock", id));
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;

        let deadline = Instant::now() + timeout;
        loop {
            let attempt = match mode {
                LockMode::Shared => file.try_lock_shared(),
                LockMode::Exclusive => file.try_lock_exclusive(),
            };

            match attempt {
                Ok(()) => return Ok(BlobLock { file, mode }),
                Err(_) if Instant::now() < deadline => thread::sleep(POLL_INTERVAL),
                Err(_) => return Err(ErrorKind::LockTimeout(id.to_string()).into()),
            }
        }
    }
}

impl Drop for BlobLock {
    fn drop(&mut self) {
        // Best-effort: an error here means the handle is already gone, in
        // which case the OS has released the lock for us anyway.
        let _ = FileExt::unlock(&self.file);
    }
}
