use std::error::Error;
use std::sync::Arc;

use futures::future::FutureExt;
use tokio::sync::mpsc;
use warp::Filter;

use inspections::config::{get_variable, parse_variable, parse_variable_or, DatabaseSettings};
use inspections::db::{create_pool, PgDb};
use inspections::environment::{Config, Environment};
use inspections::routes;
use inspections::urls::Urls;
use log::{error, info, initialize_logger};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let main_port: u16 = parse_variable("INSPECTIONS_PORT");
    let admin_port: u16 = parse_variable("INSPECTIONS_ADMIN_PORT");

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port);
    let logger = Arc::new(logger);

    let settings = DatabaseSettings::from_env();
    info!(logger, "Creating database pool..."; "max_connections" => settings.max_connections, "acquire_timeout" => ?settings.acquire_timeout);
    let pool = create_pool(
        &settings.connection_string,
        settings.max_connections,
        settings.acquire_timeout,
    )
    .await
    .map_err(|e| {
        error!(logger, "Failed to create database pool"; "error" => ?e);
        e
    })?;
    let db = Arc::new(PgDb::new(pool));

    let urls = Arc::new(Urls::new(
        get_variable("INSPECTIONS_BASE_URL"),
        get_variable("INSPECTIONS_PATH"),
    )?);

    let config = Config::new(parse_variable_or(
        "INSPECTIONS_PAGE_SIZE",
        Config::DEFAULT_PAGE_SIZE,
    ));
    let environment = Environment::new(logger.clone(), db, urls, config);

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate = Arc::new(move || {
        let termination_sender = termination_sender.clone();

        async move {
            // the receiver only goes away once shutdown has begun
            let _ = termination_sender.send(()).await;
        }
        .boxed()
    });

    let should_terminate = async move {
        termination_receiver.recv().await;
    }
    .shared();

    let ctrlc = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let signal = tokio::signal::ctrl_c();

        async move {
            tokio::select! {
                _ = should_terminate => {},
                _ = signal => {
                    terminate().await;
                }
            }
        }
    };

    let main_server = {
        let should_terminate = should_terminate.clone();

        let logger2 = logger.clone();

        let routes = routes::make_routes(environment.clone())
            .recover(move |r| routes::format_rejection(logger2.clone(), r));

        let (_, main_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], main_port), async {
                should_terminate.await;
            });

        main_server
    };

    let admin_server = {
        let should_terminate = should_terminate.clone();
        let terminate = terminate.clone();

        let routes = routes::admin::make_healthz_route(environment.clone()).or(
            routes::admin::make_termination_route(environment.clone(), terminate),
        );

        let (_, admin_server) =
            warp::serve(routes).bind_with_graceful_shutdown(([0, 0, 0, 0], admin_port), async {
                should_terminate.await;
            });

        admin_server
    };

    tokio::join!(ctrlc, main_server, admin_server);

    info!(logger, "Exiting gracefully...");

    Ok(())
}
