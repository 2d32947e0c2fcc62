use chrono::{DateTime, Utc};
use diesel::*;
use uuid::Uuid;

use super::schema::*;

/// One row: a blob's metadata.
#[derive(Queryable, Identifiable, Debug, Clone, PartialEq)]
#[diesel(table_name = file_meta)]
pub struct FileMeta {
    pub id: Uuid,
    pub filename: String,
    pub extension: String,
    pub path: String,
    pub size: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = file_meta)]
pub struct NewFileMeta {
    pub id: Uuid,
    pub filename: String,
    pub extension: String,
    pub path: String,
    pub size: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The subset of fields `update_file_meta` may change. A field left
/// `None` leaves the existing value untouched — except `comment`, whose
/// `Some(None)` means "set it to null" and bare `None` means "don't touch
/// it". This is a plain DTO, not a diesel changeset: [`MetaStore::update`]
/// merges it against the existing row itself, so every column is written
/// explicitly on update rather than relying on diesel's None-skips-field
/// convention (which cannot express "null out `comment`" and "leave
/// `filename` alone" at the same time on one changeset struct).
#[derive(Debug, Default, Clone)]
pub struct FileMetaChanges {
    pub filename: Option<String>,
    pub extension: Option<String>,
    pub path: Option<String>,
    pub comment: Option<Option<String>>,
}

impl FileMetaChanges {
    pub fn is_empty(&self) -> bool {
        self.filename.is_none()
            && self.extension.is_none()
            && self.path.is_none()
            && self.comment.is_none()
    }
}
