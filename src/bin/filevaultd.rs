//! Server entry point: parse a couple of CLI overrides with `clap`, load
//! configuration, recover any orphaned blob-store state left over from a
//! crash, then serve.

use clap::{App, Arg};

use filevault::blobstore::BlobStore;
use filevault::config::Config;
use filevault::metastore::build_pool_with_retry;

#[rocket::main]
async fn main() {
    env_logger::init();

    let matches = App::new("filevaultd")
        .about("Content-addressed file storage service")
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Overrides APP_PORT")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("storage")
                .short("f")
                .long("storage")
                .value_name("DIR")
                .help("Overrides FILE_STORAGE_PATH")
                .takes_value(true),
        )
        .get_matches();

    let mut config = Config::from_env().expect("invalid configuration");

    if let Some(port) = matches.value_of("port") {
        config.app_port = port.parse().expect("invalid --port");
    }
    if let Some(dir) = matches.value_of("storage") {
        config.file_storage_path = dir.to_string();
    }

    log::info!(
        "recovering orphan staging files under {}",
        config.file_storage_path
    );
    BlobStore::recover(
        std::path::Path::new(&config.file_storage_path),
        &config.pending_file_prefix,
        config.lock_timeout,
    )
    .expect("blob store recovery failed");

    log::info!(
        "connecting to the database (up to {} retries, {:?} apart)",
        config.db_retries,
        config.db_retry_delay
    );
    let pool = build_pool_with_retry(&config.database_url, config.db_retries, config.db_retry_delay)
        .expect("failed to connect to the database");

    let rocket_config = rocket::Config {
        address: config
            .app_host
            .parse()
            .expect("APP_HOST must be a valid IP address"),
        port: config.app_port,
        ..rocket::Config::default()
    };

    log::info!("listening on {}:{}", config.app_host, config.app_port);

    let rocket = filevault::http::build(pool, config).configure(rocket_config);

    if let Err(e) = rocket.launch().await {
        log::error!("server error: {}", e);
    }
}
