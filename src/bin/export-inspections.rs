use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use dotenv::dotenv;
use structopt::StructOpt;

use inspections::config::DatabaseSettings;
use inspections::db::{create_pool, Db, PgDb};
use inspections::export;
use log::{debug, info, initialize_logger};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "export-inspections",
    about = "Write every active inspection as CSV"
)]
struct Opt {
    /// The file to write to, instead of standard output
    #[structopt(short, long, parse(from_os_str))]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = initialize_logger();

    let settings = DatabaseSettings::from_env();
    let pool = create_pool(
        &settings.connection_string,
        settings.max_connections,
        settings.acquire_timeout,
    )
    .await?;
    let db = PgDb::new(pool);

    debug!(logger, "Retrieving inspections...");
    let rows = db.export().await?;
    let csv = export::render(&rows);

    match &opt.output {
        Some(path) => {
            fs::write(path, csv)?;
            info!(logger, "Exported inspections"; "rows" => rows.len(), "output" => %path.display());
        }
        None => {
            io::stdout().write_all(csv.as_bytes())?;
            info!(logger, "Exported inspections"; "rows" => rows.len());
        }
    }

    Ok(())
}
