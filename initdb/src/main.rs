//! Creates the inspections table (and its condition domain) in the
//! database named by `INSPECTIONS_DB_CONNECTION_STRING`.

use std::env;

use movine::Movine;
use postgres::{Client, NoTls};

use log::{debug, info, initialize_logger, Logger};

const CONNECTION_STRING_VARIABLE: &str = "INSPECTIONS_DB_CONNECTION_STRING";
const MIGRATIONS_VARIABLE: &str = "INSPECTIONS_MIGRATIONS_DIR";
const DEFAULT_MIGRATIONS: &str = "./migrations";

fn main() {
    dotenv::dotenv().ok();

    let logger = initialize_logger();

    let connection_string = env::var(CONNECTION_STRING_VARIABLE)
        .unwrap_or_else(|_| panic!("could not read {}", CONNECTION_STRING_VARIABLE));
    let migrations = env::var(MIGRATIONS_VARIABLE).unwrap_or_else(|_| DEFAULT_MIGRATIONS.to_owned());

    debug!(logger, "Connecting to database...");
    let mut client =
        Client::connect(&connection_string, NoTls).expect("could not connect to database");

    migrate(&logger, &mut client, &migrations);

    info!(logger, "Database ready"; "migrations" => migrations);
}

fn migrate(logger: &Logger, client: &mut Client, migrations: &str) {
    let mut movine = Movine::new(client);
    movine.set_migration_dir(migrations);

    // a fresh database has no migration bookkeeping yet
    if movine.status().is_err() {
        debug!(logger, "Creating migration table...");
        movine
            .initialize()
            .expect("could not create the migration table");
    }

    debug!(logger, "Applying pending migrations..."; "directory" => migrations);
    movine.up().expect("could not apply migrations");
}
