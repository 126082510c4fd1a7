use filmroom_common::db::create_db_async_pool;
use filmroom_common::storage::local::LocalFileStore;
use filmroom_common::storage::mock::MockFileStore;
use filmroom_common::storage::FileStorage;

use actix_web::web::Data;
use actix_web::{App, HttpServer};
use flexi_logger::{
    Age, Cleanup, Criterion, Duplicate, FileSpec, LogSpecification, Logger, Naming, WriteMode,
};
use std::sync::Arc;

mod env;
mod handlers;
mod middleware;
mod services;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let mut port = 9000u16;

    let mut args = std::env::args();

    // Eat the first argument, which is the relative path to the executable
    args.next();

    while let Some(arg) = args.next() {
        match arg.to_lowercase().as_str() {
            "--port" => {
                let Some(port_str) = args.next() else {
                    eprintln!("ERROR: --port option specified but no port was given");
                    std::process::exit(1);
                };

                port = match port_str.parse::<u16>() {
                    Ok(p) => p,
                    Err(_) => {
                        eprintln!("ERROR: Incorrect format for port. Integer expected");
                        std::process::exit(1);
                    }
                };
            }
            a => {
                eprintln!("ERROR: Invalid argument: {}", &a);
                std::process::exit(1);
            }
        }
    }

    let log_spec = LogSpecification::parse(&env::CONF.log_level).unwrap_or_else(|_| {
        eprintln!(
            "WARNING: Invalid log level '{}'. Falling back to info",
            env::CONF.log_level
        );
        LogSpecification::info()
    });

    let _logger = match Logger::with(log_spec)
        .log_to_file(FileSpec::default().directory("./logs"))
        .rotate(
            Criterion::Age(Age::Day),
            Naming::Timestamps,
            Cleanup::KeepLogAndCompressedFiles(60, 365),
        )
        .cleanup_in_background_thread(true)
        .duplicate_to_stdout(Duplicate::All)
        .write_mode(WriteMode::Async)
        .format(|writer, now, record| {
            write!(
                writer,
                "{:5} | {} | {}:{} | {}",
                record.level(),
                now.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
                record.module_path().unwrap_or("<unknown>"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .use_utc()
        .start()
    {
        Ok(l) => l,
        Err(e) => {
            eprintln!("ERROR: Failed to start logger: {e}");
            std::process::exit(1);
        }
    };

    let actix_workers = env::CONF.actix_worker_count;

    // Every worker needs to be able to hold a connection
    let db_max_connections = env::CONF.db_max_connections.max(actix_workers as u32);

    log::info!("Connecting to database...");

    let db_async_pool = match create_db_async_pool(
        &env::CONF.database_uri(),
        db_max_connections,
        env::CONF.db_idle_timeout_secs,
    )
    .await
    {
        Ok(p) => p,
        Err(e) => {
            log::error!("{e}");
            eprintln!("ERROR: Failed to connect to database");
            std::process::exit(1);
        }
    };

    log::info!("Successfully connected to database");

    let file_storage: FileStorage = if env::CONF.storage_enabled {
        log::info!("Storing files under {}", env::CONF.storage_root);
        Box::new(LocalFileStore::new(
            &env::CONF.storage_root,
            &env::CONF.storage_public_url,
        ))
    } else {
        log::info!("File storage is disabled. Using in-memory file store.");
        Box::new(MockFileStore::new())
    };

    let file_storage = Arc::new(file_storage);
    let limiters = services::api::RouteLimiters::default();

    HttpServer::new(move || {
        App::new()
            .app_data(Data::new(db_async_pool.clone()))
            .app_data(Data::from(Arc::clone(&file_storage)))
            .configure(|cfg| services::api::configure(cfg, limiters.clone()))
            .configure(services::health::configure)
            .wrap(actix_web::middleware::Logger::default())
    })
    .workers(actix_workers)
    .bind(format!("127.0.0.1:{port}"))?
    .run()
    .await?;

    // Only sound once no worker can read the config anymore
    unsafe {
        env::CONF.zeroize();
    }

    Ok(())
}
