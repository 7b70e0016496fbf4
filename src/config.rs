use chrono::Duration;
use log::{error, info};
use mongodb::{options::ClientOptions, Client as MongoClient};
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::time::Duration as StdDuration,
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{api::auth::IdentityProvider, mongodb::ensure_indexes_exist};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
///
/// Every field is required: a missing value stops the server at ignition.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    public_url: String,
    required_domain: String,
    google_client_id: String,
    session_ttl: u32,
    sign_in_ttl: u32,
    db_timeout: u32,
    identity_timeout: u32,
    // secrets
    session_secret: String,
    google_client_secret: String,
}

impl Config {
    /// Externally visible base URL of the site, without a trailing slash.
    /// Used to build the OAuth redirect URI.
    pub fn public_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }

    /// The hosted-domain claim a participant's account must carry.
    pub fn required_domain(&self) -> &str {
        &self.required_domain
    }

    /// OAuth client ID registered with the identity provider.
    pub fn google_client_id(&self) -> &str {
        &self.google_client_id
    }

    /// OAuth client secret registered with the identity provider.
    pub fn google_client_secret(&self) -> &str {
        &self.google_client_secret
    }

    /// Valid lifetime of session cookies in seconds.
    pub fn session_ttl(&self) -> Duration {
        Duration::seconds(self.session_ttl.into())
    }

    /// Valid lifetime of the sign-in anti-forgery cookie in seconds.
    pub fn sign_in_ttl(&self) -> Duration {
        Duration::seconds(self.sign_in_ttl.into())
    }

    /// Upper bound on any single database operation.
    pub fn db_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.db_timeout.into())
    }

    /// Upper bound on any single call to the identity provider.
    pub fn identity_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.identity_timeout.into())
    }

    /// Secret key used to sign session JWTs.
    pub fn session_secret(&self) -> &[u8] {
        self.session_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    db_timeout: u32,
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let timeout = StdDuration::from_secs(config.db_timeout.into());
        let client = match connect(&config.db_uri, timeout).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to connect to database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Name of the production database.
pub const DATABASE: &str = "survey";

/// Build a client whose server selection and connection attempts give up
/// after `timeout`.
pub async fn connect(
    db_uri: &str,
    timeout: StdDuration,
) -> Result<MongoClient, mongodb::error::Error> {
    let mut options = ClientOptions::parse(db_uri).await?;
    options.server_selection_timeout = Some(timeout);
    options.connect_timeout = Some(timeout);
    options.app_name = Some("article-survey".to_string());
    MongoClient::with_options(options)
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    DATABASE.to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// A fairing that builds the HTTP client used to talk to the identity provider
/// and places it into managed state.
pub struct IdentityFairing;

#[rocket::async_trait]
impl Fairing for IdentityFairing {
    fn info(&self) -> Info {
        Info {
            name: "Identity provider",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Shares the application config's keys.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load identity provider config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let provider = match IdentityProvider::new(config.identity_timeout()) {
            Ok(provider) => provider,
            Err(e) => {
                error!("Failed to build identity provider client: {e}");
                return Err(rocket);
            }
        };
        info!("Loaded identity provider config");

        // Manage the state.
        rocket = rocket.manage(provider);
        Ok(rocket)
    }
}

#[cfg(test)]
mod tests {
    use rocket::figment::{providers::Serialized, Figment};

    use super::*;

    fn base_figment() -> Figment {
        Figment::new().merge(Serialized::defaults(rocket::serde::json::serde_json::json!({
            "public_url": "https://survey.example.edu/",
            "required_domain": "student.example.edu",
            "google_client_id": "client",
            "google_client_secret": "secret",
            "session_ttl": 3600,
            "sign_in_ttl": 600,
            "db_timeout": 5,
            "identity_timeout": 10,
            "session_secret": "session",
        })))
    }

    #[test]
    fn loads_complete_config() {
        let config: Config = base_figment().extract().unwrap();
        assert_eq!(config.public_url(), "https://survey.example.edu");
        assert_eq!(config.session_ttl(), Duration::hours(1));
        assert_eq!(config.db_timeout(), StdDuration::from_secs(5));
        assert_eq!(config.session_secret(), b"session");
    }

    #[test]
    fn missing_value_is_fatal() {
        let figment = Figment::new().merge(Serialized::defaults(
            rocket::serde::json::serde_json::json!({ "public_url": "https://x" }),
        ));
        assert!(figment.extract::<Config>().is_err());
    }
}
