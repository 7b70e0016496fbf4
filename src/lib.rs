#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

use crate::config::{DatabaseFairing, IdentityFairing};
use crate::logging::LoggerFairing;

pub use crate::config::{Config, ConfigFairing};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

/// Build the survey server, ready to ignite.
pub fn build() -> Rocket<Build> {
    base_rocket().attach(DatabaseFairing)
}

/// Everything except the database connection.
fn base_rocket() -> Rocket<Build> {
    rocket::build()
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(IdentityFairing)
        .mount("/", api::routes())
        .register("/", api::catchers())
}

/// Get a connection to the database configured in `Rocket.toml`.
#[cfg(test)]
async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .unwrap();
    mongodb::Client::with_uri_str(db_uri).await.unwrap()
}

/// Get a fresh database name for one test.
#[cfg(test)]
fn database() -> String {
    config::get_database_name()
}

/// Build the server against a specific database.
#[cfg(test)]
async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    log4rs_test_utils::test_logging::init_logging_once_for(["article_survey"], None, None);
    let db = client.database(db_name);
    base_rocket().manage(client).manage(db)
}
