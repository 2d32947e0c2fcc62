//! A single-writer view of the blob directory for the lifetime of one
//! request: deferred writes, atomic two-phase commit, and per-blob
//! advisory locking.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use log::warn;
use uuid::Uuid;

use crate::errors::*;

use super::lock::{BlobLock, LockMode};

pub struct BlobStore {
    root: PathBuf,
    pending_prefix: String,
    lock_timeout: Duration,
    pending: HashMap<Uuid, Vec<u8>>,
    locks: HashMap<Uuid, BlobLock>,
}

impl BlobStore {
    /// Opens a session against `root`, creating the directory if it does
    /// not yet exist.
    pub fn open(root: impl Into<PathBuf>, pending_prefix: &str, lock_timeout: Duration) -> Result<BlobStore> {
        let root = root.into();
        fs::create_dir_all(&root)
            .chain_err(|| ErrorKind::BlobStoreUnavailable(format!("cannot create {}", root.display())))?;

        Ok(BlobStore {
            root,
            pending_prefix: pending_prefix.to_string(),
            lock_timeout,
            pending: HashMap::new(),
            locks: HashMap::new(),
        })
    }

    fn final_path(&self, id: &Uuid) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn staging_path(&self, id: &Uuid) -> PathBuf {
        self.root.join(format!("{}{}", self.pending_prefix, id))
    }

    /// Acquires `mode` on `id` for this session, upgrading a held shared
    /// lock to exclusive by releasing and re-acquiring it (not an atomic
    /// upgrade — fine for a session that is single-threaded per request).
    fn acquire(&mut self, id: &Uuid, mode: LockMode) -> Result<()> {
        if let Some(held) = self.locks.get(id) {
            if held.mode() == LockMode::Exclusive || held.mode() == mode {
                return Ok(());
            }
            self.locks.remove(id);
        }

        let lock = BlobLock::acquire(&self.root, &id.to_string(), mode, self.lock_timeout)?;
        self.locks.insert(*id, lock);
        Ok(())
    }

    /// Stages a write. Idempotent within a session: a later `add`
    /// overwrites earlier pending bytes for the same id.
    pub fn add(&mut self, id: Uuid, bytes: Vec<u8>) -> Result<()> {
        self.acquire(&id, LockMode::Exclusive)?;
        self.pending.insert(id, bytes);
        Ok(())
    }

    /// Reads committed bytes. Fails with `NotFound` if the blob does not
    /// exist.
    pub fn get(&mut self, id: &Uuid) -> Result<Vec<u8>> {
        self.acquire(id, LockMode::Shared)?;
        let path = self.final_path(id);
        let result = fs::read(&path)
            .map_err(|_| Error::from_kind(ErrorKind::NotFound(format!("blob '{}'", id))));
        self.locks.remove(id);
        result
    }

    /// Removes the committed blob for `id`, if present. Returns whether
    /// anything was removed. Lock released on exit regardless of outcome.
    pub fn delete(&mut self, id: &Uuid) -> Result<bool> {
        self.acquire(id, LockMode::Exclusive)?;
        let path = self.final_path(id);
        let existed = path.exists();
        let result = if existed {
            fs::remove_file(&path).map(|_| true).map_err(Error::from)
        } else {
            Ok(false)
        };
        self.locks.remove(id);
        result
    }

    /// Best-effort existence check. Does not take a lock.
    pub fn exists(&self, id: &Uuid) -> bool {
        self.final_path(id).exists()
    }

    /// Lists committed blob ids, filtering out pending staging files and
    /// lock side files.
    pub fn list(&self) -> Result<Vec<Uuid>> {
        let mut out = Vec::new();
        let entries = fs::read_dir(&self.root)
            .chain_err(|| ErrorKind::BlobStoreUnavailable(format!("cannot list {}", self.root.display())))?;

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(n) => n,
                None => continue,
            };

            if name.starts_with(&self.pending_prefix) || name.ends_with(".lock") {
                continue;
            }

            if let Ok(id) = name.parse::<Uuid>() {
                out.push(id);
            }
        }

        Ok(out)
    }

    /// Writes every pending entry to its staging path. Idempotent and
    /// restartable — safe to call more than once.
    pub fn flush(&mut self) -> Result<()> {
        for (id, bytes) in self.pending.iter() {
            write_staging(&self.staging_path(id), bytes)?;
        }
        Ok(())
    }

    /// Two-phase durable promotion: flush anything not already flushed,
    /// then atomically rename each staging file over the final path.
    /// Releases all locks held by this session regardless of outcome.
    pub fn commit(mut self) -> Result<()> {
        let result = self.commit_inner();
        self.release_all();
        self.pending.clear();
        result
    }

    fn commit_inner(&mut self) -> Result<()> {
        for (id, bytes) in self.pending.iter() {
            let staging = self.staging_path(id);
            if !staging.exists() {
                write_staging(&staging, bytes).chain_err(|| {
                    ErrorKind::BlobWriteFailed(format!("flushing '{}'", id))
                })?;
            }

            let final_path = self.final_path(id);
            if final_path.exists() {
                fs::remove_file(&final_path).chain_err(|| {
                    ErrorKind::BlobWriteFailed(format!("replacing '{}'", id))
                })?;
            }

            fs::rename(&staging, &final_path).chain_err(|| {
                ErrorKind::BlobWriteFailed(format!("promoting '{}'", id))
            })?;
        }
        Ok(())
    }

    /// Removes any staging files written for pending entries and releases
    /// all locks. Never fails — a rollback that hits an I/O error on
    /// cleanup still releases locks and swallows the error.
    pub fn rollback(mut self) {
        for id in self.pending.keys() {
            let staging = self.staging_path(id);
            if staging.exists() {
                if let Err(e) = fs::remove_file(&staging) {
                    warn!("rollback: failed to remove staging file for '{}': {}", id, e);
                }
            }
        }
        self.release_all();
        self.pending.clear();
    }

    fn release_all(&mut self) {
        self.locks.clear();
    }

    /// Startup-only recovery pass: for every orphan staging file under
    /// `root`, lock the underlying id exclusively and remove it. Skips (and
    /// logs) files it cannot lock rather than failing the whole pass.
    pub fn recover(root: &Path, pending_prefix: &str, lock_timeout: Duration) -> Result<()> {
        fs::create_dir_all(root)
            .chain_err(|| ErrorKind::BlobStoreUnavailable(format!("cannot create {}", root.display())))?;

        for entry in fs::read_dir(root)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(n) => n.to_string(),
                None => continue,
            };

            if !name.starts_with(pending_prefix) {
                continue;
            }

            let id_str = &name[pending_prefix.len()..];

            match BlobLock::acquire(root, id_str, LockMode::Exclusive, lock_timeout) {
                Ok(_lock) => {
                    if let Err(e) = fs::remove_file(root.join(&name)) {
                        warn!("recover: failed to remove orphan '{}': {}", name, e);
                    }
                }
                Err(e) => {
                    warn!("recover: could not lock '{}', skipping: {}", id_str, e);
                }
            }
        }

        Ok(())
    }
}

impl Drop for BlobStore {
    /// Safety net for the `?`-early-return and panic paths: if a session is
    /// dropped with pending writes still staged, clean them up the same
    /// way `rollback` would rather than leaking staging files. Locks are
    /// always released on drop via [`BlobLock`]'s own `Drop` impl.
    fn drop(&mut self) {
        for id in self.pending.keys() {
            let staging = self.staging_path(id);
            if staging.exists() {
                if let Err(e) = fs::remove_file(&staging) {
                    warn!("drop: failed to remove staging file for '{}': {}", id, e);
                }
            }
        }
    }
}

fn write_staging(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = fs::File::create(path)?;
    f.write_all(bytes)?;
    f.flush()?;
    Ok(())
}
