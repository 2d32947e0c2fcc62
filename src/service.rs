//! Business-level orchestration above a [`UnitOfWork`]: uniqueness
//! checks, id allocation, and the cross-store reconciliation pass.

use chrono::Utc;
use uuid::Uuid;

use crate::errors::*;
use crate::metastore::models::{FileMeta, FileMetaChanges, NewFileMeta};
use crate::unit_of_work::UnitOfWork;
use crate::validation::{validate_extension, validate_filename, validate_path};

pub struct FileHolderService;

impl FileHolderService {
    /// Validates inputs, rejects an existing `(path, filename, extension)`
    /// triple, allocates a fresh id, inserts the metadata row, and stages
    /// the blob write. Commit is owned by the caller's `UnitOfWork`.
    pub fn create_file(
        uow: &mut UnitOfWork,
        bytes: Vec<u8>,
        filename: &str,
        extension: &str,
        path: &str,
        comment: Option<String>,
    ) -> Result<FileMeta> {
        validate_filename(filename)?;
        validate_extension(extension)?;
        validate_path(path)?;

        if uow.meta().get_by_triple(path, filename, extension)?.is_some() {
            return Err(ErrorKind::AlreadyExists(format!(
                "a file already exists at '{}{}.{}'",
                path, filename, extension
            ))
            .into());
        }

        let id = Uuid::new_v4();
        let size = bytes.len() as i64;

        let meta = uow.meta().save(NewFileMeta {
            id,
            filename: filename.to_string(),
            extension: extension.to_string(),
            path: path.to_string(),
            size,
            comment,
            created_at: Utc::now(),
        })?;

        uow.blob().add(id, bytes)?;

        Ok(meta)
    }

    pub fn get_file_meta(uow: &mut UnitOfWork, id: Uuid) -> Result<FileMeta> {
        uow.meta()
            .get_by_id(id)?
            .ok_or_else(|| ErrorKind::NotFound(format!("file '{}'", id)).into())
    }

    pub fn get_file_meta_by_full_path(
        uow: &mut UnitOfWork,
        path: &str,
        filename: &str,
        extension: &str,
    ) -> Result<FileMeta> {
        uow.meta()
            .get_by_triple(path, filename, extension)?
            .ok_or_else(|| {
                ErrorKind::NotFound(format!("file '{}{}.{}'", path, filename, extension)).into()
            })
    }

    pub fn get_file_bytes(uow: &mut UnitOfWork, id: Uuid) -> Result<Vec<u8>> {
        Self::get_file_meta(uow, id)?;
        uow.blob().get(&id)
    }

    pub fn get_file_bytes_by_triple(
        uow: &mut UnitOfWork,
        path: &str,
        filename: &str,
        extension: &str,
    ) -> Result<Vec<u8>> {
        let meta = Self::get_file_meta_by_full_path(uow, path, filename, extension)?;
        uow.blob().get(&meta.id)
    }

    pub fn delete_file(uow: &mut UnitOfWork, id: Uuid) -> Result<bool> {
        let meta = Self::get_file_meta(uow, id)?;
        uow.blob().delete(&meta.id)?;
        uow.meta().delete(&meta)?;
        Ok(true)
    }

    pub fn list_files(
        uow: &mut UnitOfWork,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<FileMeta>> {
        uow.meta().list(limit, offset)
    }

    /// Normalizes `prefix` to end with `/` (appending one if missing); an
    /// empty prefix always returns no results.
    pub fn search_by_path_prefix(uow: &mut UnitOfWork, prefix: &str) -> Result<Vec<FileMeta>> {
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        let normalized = if prefix.ends_with('/') {
            prefix.to_string()
        } else {
            format!("{}/", prefix)
        };

        uow.meta().get_by_path_prefix(&normalized)
    }

    /// Applies `changes`; an empty change set returns the row unchanged.
    /// Detects a collision with another row on the path/filename/extension
    /// uniqueness invariant and fails with `AlreadyExists` rather than
    /// silently renaming over an existing file.
    pub fn update_file_meta(
        uow: &mut UnitOfWork,
        id: Uuid,
        changes: FileMetaChanges,
    ) -> Result<FileMeta> {
        let existing = Self::get_file_meta(uow, id)?;

        if let Some(filename) = &changes.filename {
            validate_filename(filename)?;
        }
        if let Some(extension) = &changes.extension {
            validate_extension(extension)?;
        }
        if let Some(path) = &changes.path {
            validate_path(path)?;
        }

        if !changes.is_empty() {
            let next_path = changes.path.as_deref().unwrap_or(&existing.path);
            let next_filename = changes.filename.as_deref().unwrap_or(&existing.filename);
            let next_extension = changes.extension.as_deref().unwrap_or(&existing.extension);

            if (next_path, next_filename, next_extension)
                != (existing.path.as_str(), existing.filename.as_str(), existing.extension.as_str())
            {
                if let Some(other) =
                    uow.meta().get_by_triple(next_path, next_filename, next_extension)?
                {
                    if other.id != existing.id {
                        return Err(ErrorKind::AlreadyExists(format!(
                            "a file already exists at '{}{}.{}'",
                            next_path, next_filename, next_extension
                        ))
                        .into());
                    }
                }
            }
        }

        uow.meta().update(&existing, &changes)
    }

    /// Reconciliation pass: restores `ids(MetaStore) == ids(BlobStore)` by
    /// deleting drift on either side. Must be run inside a `UnitOfWork` so
    /// both edits commit together.
    pub fn sync_storage_with_db(uow: &mut UnitOfWork) -> Result<()> {
        let meta_rows = uow.meta().list(None, None)?;
        let meta_ids: std::collections::HashSet<Uuid> =
            meta_rows.iter().map(|m| m.id).collect();

        let blob_ids = uow.blob().list()?;

        for blob_id in &blob_ids {
            if !meta_ids.contains(blob_id) {
                uow.blob().delete(blob_id)?;
            }
        }

        for meta in &meta_rows {
            if !uow.blob().exists(&meta.id) {
                uow.meta().delete_by_id(meta.id)?;
            }
        }

        Ok(())
    }
}
