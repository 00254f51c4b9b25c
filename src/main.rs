use std::error::Error;
use std::sync::Arc;

use futures::future::FutureExt;
use tokio::sync::mpsc;
use warp::Filter;

use experiences::catalog::Catalog;
use experiences::config::{get_optional_variable, get_variable, DataConfig};
use experiences::environment::Environment;
use experiences::routes;
use log::{error, info, initialize_logger};

const DEFAULT_PATH: &str = "experiences";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let main_port: u16 = get_variable("EXPERIENCES_PORT")
        .parse()
        .expect("parse EXPERIENCES_PORT as u16");
    let admin_port: u16 = get_variable("EXPERIENCES_ADMIN_PORT")
        .parse()
        .expect("parse EXPERIENCES_ADMIN_PORT as u16");
    let path = get_optional_variable("EXPERIENCES_PATH").unwrap_or_else(|| DEFAULT_PATH.to_owned());

    info!(logger, "Starting..."; "main_port" => main_port, "admin_port" => admin_port, "path" => &path);
    let logger = Arc::new(logger);

    let config = DataConfig::from_env(&logger);
    let catalog = Arc::new(Catalog::from_config(logger.clone(), &config)?);
    info!(logger, "Catalog ready"; "mode" => catalog.mode().as_str(), "sources" => ?catalog.sources());

    let environment = Environment::new(logger.clone(), catalog, path);

    let (termination_sender, mut termination_receiver) = mpsc::channel::<()>(1);

    let terminate = {
        let logger = logger.clone();

        Arc::new(move || {
            let termination_sender = termination_sender.clone();
            let logger = logger.clone();

            async move {
                if termination_sender.send(()).await.is_err() {
                    error!(logger, "Termination was already requested");
                }
            }
            .boxed()
        })
    };

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

        let routes = routes::make_catalog_routes(environment.clone())
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

        let routes = routes::admin::make_healthz_route(environment.clone())
            .or(routes::admin::make_termination_route(terminate));

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
