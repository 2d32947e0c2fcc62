//! The HTTP adapter: thin JSON/multipart surface over
//! [`crate::service::FileHolderService`]. Owns no state beyond the shared,
//! read-only connection pool and config — every request builds its own
//! [`crate::unit_of_work::UnitOfWork`].

pub mod dto;
pub mod responders;
pub mod routes;

use rocket::serde::json::Json;
use rocket::{catch, catchers, Build, Rocket};
use serde::Serialize;

use crate::config::Config;
use crate::metastore::DbPool;

#[derive(Serialize)]
struct NotFoundBody {
    error: &'static str,
}

#[catch(404)]
fn not_found() -> Json<NotFoundBody> {
    Json(NotFoundBody {
        error: "no such route",
    })
}

/// Assembles the rocket instance: routes, catchers, and the shared pool
/// and config as managed state. Does not launch it — callers decide that,
/// which keeps this usable from integration tests via `rocket::local`.
pub fn build(pool: DbPool, config: Config) -> Rocket<Build> {
    rocket::build()
        .manage(pool)
        .manage(config)
        .mount("/", routes::routes())
        .register("/", catchers![not_found])
}
