//! Typed CRUD against `file_meta`, scoped to a single transaction.
//!
//! Every method here runs inside one transaction that the owning
//! [`crate::unit_of_work::UnitOfWork`] starts, commits, or rolls back
//! explicitly. diesel's closure-scoped `conn.transaction(...)` can't
//! express the externally-sequenced, meta-then-blob commit ordering a
//! `UnitOfWork` needs, so the transaction is driven with raw
//! `BEGIN`/`COMMIT`/`ROLLBACK` statements instead.

use std::thread;
use std::time::Duration;

use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sql_query;
use log::warn;
use uuid::Uuid;

use crate::errors::*;

use super::models::{FileMeta, FileMetaChanges, NewFileMeta};
use super::schema::file_meta::dsl;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

pub fn build_pool(database_url: &str) -> Result<DbPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Pool::builder()
        .build(manager)
        .chain_err(|| "failed to build the database connection pool")
}

/// Builds the pool and leases one connection from it to confirm the
/// database is actually reachable, retrying up to `retries` times with
/// `retry_delay` between attempts. The only startup-time recovery this
/// core performs, per spec.
pub fn build_pool_with_retry(database_url: &str, retries: u32, retry_delay: Duration) -> Result<DbPool> {
    let mut attempt = 0;
    loop {
        let outcome = build_pool(database_url).and_then(|pool| {
            pool.get().chain_err(|| "failed to lease a database connection")?;
            Ok(pool)
        });

        match outcome {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(
                    "database connection attempt {}/{} failed, retrying in {:?}: {}",
                    attempt, retries, retry_delay, e
                );
                thread::sleep(retry_delay);
            }
            Err(e) => return Err(e),
        }
    }
}

pub struct MetaStore {
    conn: PooledConnection<ConnectionManager<PgConnection>>,
    in_transaction: bool,
}

impl MetaStore {
    /// Leases a connection from `pool` and opens a transaction on it.
    pub fn begin(pool: &DbPool) -> Result<MetaStore> {
        let mut conn = pool.get().chain_err(|| "failed to lease a database connection")?;
        sql_query("BEGIN").execute(&mut conn)?;
        Ok(MetaStore {
            conn,
            in_transaction: true,
        })
    }

    /// Commits the transaction. Consumes the session: a `MetaStore` is
    /// only ever committed once.
    pub fn commit(mut self) -> Result<()> {
        sql_query("COMMIT").execute(&mut self.conn)?;
        self.in_transaction = false;
        Ok(())
    }

    /// Rolls back the transaction. Never panics; logs and swallows errors
    /// from the rollback statement itself.
    pub fn rollback(mut self) {
        if let Err(e) = sql_query("ROLLBACK").execute(&mut self.conn) {
            warn!("rollback: ROLLBACK statement failed: {}", e);
        }
        self.in_transaction = false;
    }

    pub fn save(&mut self, new_meta: NewFileMeta) -> Result<FileMeta> {
        diesel::insert_into(dsl::file_meta)
            .values(&new_meta)
            .get_result::<FileMeta>(&mut self.conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => Error::from_kind(ErrorKind::AlreadyExists(format!(
                    "a file already exists at '{}{}.{}'",
                    new_meta.path, new_meta.filename, new_meta.extension
                ))),
                other => other.into(),
            })
    }

    pub fn get_by_id(&mut self, id: Uuid) -> Result<Option<FileMeta>> {
        let res = dsl::file_meta
            .filter(dsl::id.eq(id))
            .first::<FileMeta>(&mut self.conn)
            .optional()?;
        Ok(res)
    }

    pub fn get_by_triple(
        &mut self,
        path: &str,
        filename: &str,
        extension: &str,
    ) -> Result<Option<FileMeta>> {
        let res = dsl::file_meta
            .filter(dsl::path.eq(path))
            .filter(dsl::filename.eq(filename))
            .filter(dsl::extension.eq(extension))
            .first::<FileMeta>(&mut self.conn)
            .optional()?;
        Ok(res)
    }

    /// Range scan on the `path` index, equivalent to `path LIKE 'prefix%'`.
    /// Rows are ordered by `created_at` ascending, then `id`.
    pub fn get_by_path_prefix(&mut self, prefix: &str) -> Result<Vec<FileMeta>> {
        let like_pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let res = dsl::file_meta
            .filter(dsl::path.like(like_pattern))
            .order((dsl::created_at.asc(), dsl::id.asc()))
            .load::<FileMeta>(&mut self.conn)?;
        Ok(res)
    }

    pub fn list(&mut self, limit: Option<i64>, offset: Option<i64>) -> Result<Vec<FileMeta>> {
        let mut query = dsl::file_meta
            .order((dsl::created_at.asc(), dsl::id.asc()))
            .into_boxed();

        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        if let Some(offset) = offset {
            query = query.offset(offset);
        }

        let res = query.load::<FileMeta>(&mut self.conn)?;
        Ok(res)
    }

    /// Applies `changes` on top of `existing`, sets `updated_at` to now,
    /// and writes every column back (sidesteps diesel's None-means-skip
    /// changeset semantics, which can't express "null out `comment`" and
    /// "leave `filename` alone" together). An empty change set is a no-op
    /// that returns `existing` unchanged without touching `updated_at`.
    pub fn update(&mut self, existing: &FileMeta, changes: &FileMetaChanges) -> Result<FileMeta> {
        if changes.is_empty() {
            return Ok(existing.clone());
        }

        let filename = changes.filename.clone().unwrap_or_else(|| existing.filename.clone());
        let extension = changes.extension.clone().unwrap_or_else(|| existing.extension.clone());
        let path = changes.path.clone().unwrap_or_else(|| existing.path.clone());
        let comment = match &changes.comment {
            Some(new_comment) => new_comment.clone(),
            None => existing.comment.clone(),
        };
        let updated_at = Utc::now();

        let updated = diesel::update(dsl::file_meta.filter(dsl::id.eq(existing.id)))
            .set((
                dsl::filename.eq(filename),
                dsl::extension.eq(extension),
                dsl::path.eq(path),
                dsl::comment.eq(comment),
                dsl::updated_at.eq(updated_at),
            ))
            .get_result::<FileMeta>(&mut self.conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => Error::from_kind(ErrorKind::AlreadyExists(
                    "the updated path/filename/extension collides with an existing file".into(),
                )),
                other => other.into(),
            })?;

        Ok(updated)
    }

    pub fn delete(&mut self, meta: &FileMeta) -> Result<()> {
        diesel::delete(dsl::file_meta.filter(dsl::id.eq(meta.id))).execute(&mut self.conn)?;
        Ok(())
    }

    pub fn delete_by_id(&mut self, id: Uuid) -> Result<()> {
        diesel::delete(dsl::file_meta.filter(dsl::id.eq(id))).execute(&mut self.conn)?;
        Ok(())
    }
}

impl Drop for MetaStore {
    fn drop(&mut self) {
        if self.in_transaction {
            if let Err(e) = sql_query("ROLLBACK").execute(&mut self.conn) {
                warn!("dropped MetaStore session without commit/rollback, and ROLLBACK failed: {}", e);
            }
        }
    }
}
