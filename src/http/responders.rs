//! Maps [`crate::errors::Error`] onto HTTP status codes — the one place
//! in the crate where an error kind becomes an HTTP concern.

use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder};
use rocket::serde::json::Json;
use rocket::Request;
use serde::Serialize;

use crate::errors::{Error, ErrorKind};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Wraps a core `Error` so it can be returned directly from a route
/// handler as the `Err` arm of a `Result`.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> Status {
        match self.0.kind() {
            ErrorKind::Validation(_) => Status::BadRequest,
            ErrorKind::NotFound(_) => Status::NotFound,
            ErrorKind::AlreadyExists(_) => Status::Conflict,
            ErrorKind::LockTimeout(_) => Status::ServiceUnavailable,
            ErrorKind::BlobStoreUnavailable(_) => Status::ServiceUnavailable,
            ErrorKind::BlobWriteFailed(_) => Status::InternalServerError,
            ErrorKind::Db(_) | ErrorKind::Pool(_) | ErrorKind::Io(_) | ErrorKind::Msg(_) => {
                Status::InternalServerError
            }
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        if status == Status::InternalServerError {
            log::error!("internal error: {}", self.0);
        }

        let body = ErrorBody {
            error: self.0.to_string(),
        };

        let mut res = Json(body).respond_to(req)?;
        res.set_status(status);
        res.set_header(ContentType::JSON);
        Ok(res)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Raw blob bytes served as `application/octet-stream`. Bytes are kept
/// fully opaque — no content-sniffing happens here.
pub struct RawBlob(pub Vec<u8>);

impl<'r> Responder<'r, 'static> for RawBlob {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let mut res = self.0.respond_to(req)?;
        res.set_header(ContentType::Binary);
        Ok(res)
    }
}
