use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{
    middleware::{self, Condition},
    web, App, HttpServer,
};
use clap::{Parser, ValueEnum};
use database::{
    database::{database::Database, options::DatabaseOptions},
    model::age::SystemClock,
    persistence::transaction::{TransactionFileWriteMode, TransactionWriteMode},
};

use crate::state::AppState;

mod auth;
mod errors;
mod pagination;
mod routes;
mod serializers;
mod state;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum WriteMode {
    /// fsync after every committed transaction
    Sync,
    /// Leave flushing to the OS
    Buffered,
    /// Keep everything in memory
    Off,
}

impl From<WriteMode> for TransactionWriteMode {
    fn from(write_mode: WriteMode) -> Self {
        match write_mode {
            WriteMode::Sync => TransactionWriteMode::File(TransactionFileWriteMode::Sync),
            WriteMode::Buffered => TransactionWriteMode::File(TransactionFileWriteMode::OSBuffered),
            WriteMode::Off => TransactionWriteMode::Off,
        }
    }
}

/// 📀 PersonDB REST Server, manages people and lets any account search them by name and age
#[derive(Parser, Debug)]
struct Cli {
    /// Location of the database. Reads / writes to this directory. Note: Does not support shell paths, e.g. ~
    #[clap(short, long, default_value = "data")]
    data: std::path::PathBuf,

    /// Port the rest server will run on
    #[clap(short, long, default_value = "9000")]
    port: u16,

    /// Address the rest server will run on
    #[clap(short, long, default_value = "0.0.0.0")]
    address: String,

    /// Logs every HTTP request
    #[clap(long)]
    log_http: bool,

    #[clap(long, default_value_t = 2)]
    http_workers: usize,

    /// Number of people per page of results
    #[clap(long, default_value_t = 10)]
    page_size: usize,

    /// Discards the previous transaction log instead of replaying it
    #[clap(long)]
    no_restore: bool,

    #[clap(long, value_enum, default_value_t = WriteMode::Sync)]
    write_mode: WriteMode,

    /// Staff account created at startup when it does not exist yet
    #[clap(long, env = "PERSONDB_ADMIN_USERNAME", requires = "admin_password")]
    admin_username: Option<String>,

    #[clap(long, env = "PERSONDB_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Cli::parse();

    let database_options = DatabaseOptions::default()
        .set_data_directory(args.data)
        .set_restore(!args.no_restore)
        .set_write_mode(args.write_mode.into());

    let request_manager = Database::new(database_options)?.run()?;

    if let (Some(username), Some(password)) = (&args.admin_username, &args.admin_password) {
        auth::ensure_admin(&request_manager, username, password)?;
    }

    // Set up Ctrl-C handler
    let set_handler_request_manager_clone = request_manager.clone();

    ctrlc::set_handler(move || {
        match set_handler_request_manager_clone.send_shutdown_request() {
            Ok(shutdown_response) => log::info!("Shutting down server: {}", shutdown_response),
            Err(e) => log::error!("Unable to shut down database: {}", e),
        }
    })?;

    let state = web::Data::new(AppState::new(
        request_manager,
        Arc::new(SystemClock),
        args.page_size,
    ));

    log::info!("starting HTTP server on port {}.", args.port);

    log::info!(
        "Filter people: http://{}:{}/filter-person/",
        args.address,
        args.port
    );

    let log_http = args.log_http;

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(routes::configure)
            .wrap(Cors::permissive())
            .wrap(Condition::new(log_http, middleware::Logger::default()))
    })
    .workers(args.http_workers)
    .bind((args.address, args.port))?
    .run()
    .await?;

    Ok(())
}
