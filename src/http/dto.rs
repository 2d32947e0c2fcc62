//! Wire DTOs for the HTTP surface. Kept separate from the metadata model
//! in [`crate::metastore::models`] so the core stays independent of the
//! on-the-wire shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::metastore::models::{FileMeta, FileMetaChanges};

#[derive(Debug, Serialize)]
pub struct FileRead {
    pub id: Uuid,
    pub filename: String,
    pub file_extension: String,
    pub path: String,
    pub size: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<FileMeta> for FileRead {
    fn from(meta: FileMeta) -> Self {
        FileRead {
            id: meta.id,
            filename: meta.filename,
            file_extension: meta.extension,
            path: meta.path,
            size: meta.size,
            comment: meta.comment,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        }
    }
}

/// Any subset of `{filename, file_extension, path, comment}`. `comment`
/// uses the double-`Option` trick so the JSON can distinguish "not
/// present" (leave untouched) from `"comment": null` (clear it).
#[derive(Debug, Default, Deserialize)]
pub struct FileUpdate {
    pub filename: Option<String>,
    pub file_extension: Option<String>,
    pub path: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub comment: Option<Option<String>>,
}

fn deserialize_some<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

impl From<FileUpdate> for FileMetaChanges {
    fn from(update: FileUpdate) -> Self {
        FileMetaChanges {
            filename: update.filename,
            extension: update.file_extension,
            path: update.path,
            comment: update.comment,
        }
    }
}
