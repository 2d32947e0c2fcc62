//! Route handlers. Thin: every handler opens a `UnitOfWork`, calls into
//! `FileHolderService`, and commits or rolls back before returning.

use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::{delete, get, patch, post, put, routes, FromForm, Route, State};
use serde::Serialize;
use uuid::Uuid;

use crate::config::Config;
use crate::metastore::DbPool;
use crate::service::FileHolderService;
use crate::unit_of_work::UnitOfWork;

use super::dto::{FileRead, FileUpdate};
use super::responders::{ApiResult, RawBlob};

#[derive(Serialize)]
pub struct StatusBody {
    status: &'static str,
}

#[derive(Serialize)]
pub struct DeleteBody {
    status: &'static str,
    file_id: Uuid,
}

#[get("/health")]
pub fn health() -> Json<StatusBody> {
    Json(StatusBody { status: "ok" })
}

#[derive(FromForm)]
pub struct UploadForm<'r> {
    filename: String,
    file_extension: String,
    path: String,
    comment: Option<String>,
    file: TempFile<'r>,
}

#[post("/files", data = "<form>")]
pub async fn create_file(
    pool: &State<DbPool>,
    config: &State<Config>,
    mut form: Form<UploadForm<'_>>,
) -> ApiResult<Json<FileRead>> {
    let bytes = read_temp_file(&mut form.file).await?;

    let mut uow = UnitOfWork::begin(pool, config)?;
    let result = FileHolderService::create_file(
        &mut uow,
        bytes,
        &form.filename,
        &form.file_extension,
        &form.path,
        form.comment.clone(),
    );

    match result {
        Ok(meta) => {
            uow.commit()?;
            Ok(Json(meta.into()))
        }
        Err(e) => {
            uow.rollback();
            Err(e.into())
        }
    }
}

/// `TempFile` may be backed by an on-disk temp file or held in memory
/// depending on its size; copying to a scratch path handles both
/// uniformly without depending on which variant rocket chose.
async fn read_temp_file(file: &mut TempFile<'_>) -> ApiResult<Vec<u8>> {
    let scratch = std::env::temp_dir().join(format!("filevault-upload-{}", Uuid::new_v4()));

    file.copy_to(&scratch)
        .await
        .map_err(crate::errors::Error::from)?;

    let bytes = std::fs::read(&scratch).map_err(crate::errors::Error::from)?;
    let _ = std::fs::remove_file(&scratch);
    Ok(bytes)
}

#[get("/files?<limit>&<offset>")]
pub fn list_files(
    pool: &State<DbPool>,
    config: &State<Config>,
    limit: Option<i64>,
    offset: Option<i64>,
) -> ApiResult<Json<Vec<FileRead>>> {
    with_read_only_uow(pool, config, |uow| {
        let rows = FileHolderService::list_files(uow, limit, offset)?;
        Ok(rows.into_iter().map(FileRead::from).collect())
    })
}

#[get("/files/search?<file_path>")]
pub fn search_files(
    pool: &State<DbPool>,
    config: &State<Config>,
    file_path: String,
) -> ApiResult<Json<Vec<FileRead>>> {
    with_read_only_uow(pool, config, |uow| {
        let rows = FileHolderService::search_by_path_prefix(uow, &file_path)?;
        Ok(rows.into_iter().map(FileRead::from).collect())
    })
}

#[get("/files/meta/by-path?<path>&<filename>&<file_extension>")]
pub fn get_meta_by_path(
    pool: &State<DbPool>,
    config: &State<Config>,
    path: String,
    filename: String,
    file_extension: String,
) -> ApiResult<Json<FileRead>> {
    with_read_only_uow(pool, config, |uow| {
        let meta =
            FileHolderService::get_file_meta_by_full_path(uow, &path, &filename, &file_extension)?;
        Ok(meta.into())
    })
}

#[get("/files/<id>/meta")]
pub fn get_file_meta(pool: &State<DbPool>, config: &State<Config>, id: Uuid) -> ApiResult<Json<FileRead>> {
    with_read_only_uow(pool, config, |uow| {
        let meta = FileHolderService::get_file_meta(uow, id)?;
        Ok(meta.into())
    })
}

#[get("/files/<id>")]
pub fn get_file_bytes(pool: &State<DbPool>, config: &State<Config>, id: Uuid) -> ApiResult<RawBlob> {
    let mut uow = UnitOfWork::begin(pool, config)?;
    match FileHolderService::get_file_bytes(&mut uow, id) {
        Ok(bytes) => {
            uow.rollback();
            Ok(RawBlob(bytes))
        }
        Err(e) => {
            uow.rollback();
            Err(e.into())
        }
    }
}

#[delete("/files/<id>")]
pub fn delete_file(pool: &State<DbPool>, config: &State<Config>, id: Uuid) -> ApiResult<Json<DeleteBody>> {
    let mut uow = UnitOfWork::begin(pool, config)?;
    match FileHolderService::delete_file(&mut uow, id) {
        Ok(_) => {
            uow.commit()?;
            Ok(Json(DeleteBody {
                status: "deleted",
                file_id: id,
            }))
        }
        Err(e) => {
            uow.rollback();
            Err(e.into())
        }
    }
}

fn update_file(pool: &State<DbPool>, config: &State<Config>, id: Uuid, update: Json<FileUpdate>) -> ApiResult<Json<FileRead>> {
    let mut uow = UnitOfWork::begin(pool, config)?;
    let changes = update.into_inner().into();

    match FileHolderService::update_file_meta(&mut uow, id, changes) {
        Ok(meta) => {
            uow.commit()?;
            Ok(Json(meta.into()))
        }
        Err(e) => {
            uow.rollback();
            Err(e.into())
        }
    }
}

#[put("/files/<id>", data = "<update>")]
pub fn put_file(pool: &State<DbPool>, config: &State<Config>, id: Uuid, update: Json<FileUpdate>) -> ApiResult<Json<FileRead>> {
    update_file(pool, config, id, update)
}

#[patch("/files/<id>", data = "<update>")]
pub fn patch_file(pool: &State<DbPool>, config: &State<Config>, id: Uuid, update: Json<FileUpdate>) -> ApiResult<Json<FileRead>> {
    update_file(pool, config, id, update)
}

#[post("/files/synchronise")]
pub fn synchronise(pool: &State<DbPool>, config: &State<Config>) -> ApiResult<Json<StatusBody>> {
    let mut uow = UnitOfWork::begin(pool, config)?;
    match FileHolderService::sync_storage_with_db(&mut uow) {
        Ok(()) => {
            uow.commit()?;
            Ok(Json(StatusBody {
                status: "synchronised",
            }))
        }
        Err(e) => {
            uow.rollback();
            Err(e.into())
        }
    }
}

/// Runs a read-only handler body inside a `UnitOfWork` that is always
/// rolled back afterward — reads never need to commit either side.
fn with_read_only_uow<T>(
    pool: &DbPool,
    config: &Config,
    body: impl FnOnce(&mut UnitOfWork) -> crate::errors::Result<T>,
) -> ApiResult<Json<T>> {
    let mut uow = UnitOfWork::begin(pool, config)?;
    let result = body(&mut uow);
    uow.rollback();
    Ok(Json(result?))
}

pub fn routes() -> Vec<Route> {
    routes![
        health,
        create_file,
        list_files,
        search_files,
        get_meta_by_path,
        get_file_meta,
        get_file_bytes,
        delete_file,
        put_file,
        patch_file,
        synchronise,
    ]
}
