use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use dotenv::dotenv;
use log::{info, initialize_logger};
use structopt::StructOpt;

use experiences::catalog::Catalog;
use experiences::config::{get_variable, DataConfig};
use experiences::db::{Db, PgDb};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "catalog-tool",
    about = "Export, import or provision the experience catalog"
)]
enum Opt {
    /// Print the whole catalog as JSON
    Export,

    /// Replace the catalog with the experiences in a JSON file
    Import {
        #[structopt(parse(from_os_str))]
        file: PathBuf,
    },

    /// Create the remote experiences table if it doesn't exist
    Provision,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = Arc::new(initialize_logger());

    match opt {
        Opt::Export => {
            let catalog = Catalog::from_config(logger.clone(), &DataConfig::from_env(&logger))?;

            println!("{}", catalog.export_as_json().await?);
        }
        Opt::Import { file } => {
            let catalog = Catalog::from_config(logger.clone(), &DataConfig::from_env(&logger))?;
            let text = tokio::fs::read_to_string(&file).await?;

            let count = catalog.import_from_json(&text).await?;
            info!(logger, "Imported {} experiences", count; "file" => %file.display());
        }
        Opt::Provision => {
            let connection_string = get_variable("EXPERIENCES_DB_CONNECTION_STRING");
            let db = PgDb::connect_lazy(logger.clone(), &connection_string)?;

            db.provision().await?;
            info!(logger, "Provisioned experiences table");
        }
    }

    Ok(())
}
