//! Operator tool for the article survey.
//! Loads the article catalog and manages admin rights, neither of which the
//! survey itself ever changes.

use std::fs::File;
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use mongodb::Database;
use rocket::{serde::json::serde_json, tokio::time::Duration};

use article_survey::{
    config::{connect, DATABASE},
    model::{
        db::{
            article::{Article, NewArticle},
            participant::Participant,
        },
        mongodb::{ensure_indexes_exist, Coll},
        survey::Catalog,
    },
};

const PROGRAM_NAME: &str = "survey-admin";

const ABOUT_TEXT: &str = "Manage the article catalog and admin rights of the article survey.

EXIT CODES:
     0: Success.
     1: Bad input, e.g. an unreadable article file.
     2: Database error, or the participant does not exist.";

const DB_URI: &str = "DB_URI";
const DB_URI_ENV: &str = "SURVEY_DB_URI";
const PATH: &str = "PATH";
const IDENTITY: &str = "IDENTITY";

const IMPORT: &str = "import-articles";
const LIST: &str = "list-articles";
const GRANT: &str = "grant-admin";
const REVOKE: &str = "revoke-admin";

const TIMEOUT: Duration = Duration::from_secs(15);

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    let identity = Arg::new(IDENTITY)
        .help("Verified email address the participant signed in with")
        .action(ArgAction::Set)
        .required(true);

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .subcommand_required(true)
        .arg(
            Arg::new(DB_URI)
                .long("db-uri")
                .help(format!("MongoDB connection string [default: ${DB_URI_ENV}]"))
                .action(ArgAction::Set)
                .global(true),
        )
        .subcommand(
            Command::new(IMPORT)
                .about("Add articles from a JSON array of `{ \"title\", \"image_ref\" }` objects")
                .arg(
                    Arg::new(PATH)
                        .help("Path to the JSON file")
                        .action(ArgAction::Set)
                        .required(true),
                ),
        )
        .subcommand(Command::new(LIST).about("Print every article in the catalog"))
        .subcommand(
            Command::new(GRANT)
                .about("Allow a participant to export statistics")
                .arg(identity.clone()),
        )
        .subcommand(
            Command::new(REVOKE)
                .about("Stop a participant from exporting statistics")
                .arg(identity),
        )
}

/// Errors that this program may produce.
#[derive(Debug)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the article file.
    Format(String),
    /// The survey backend reported an error.
    Survey(article_survey::error::Error),
}

impl From<article_survey::error::Error> for Error {
    fn from(err: article_survey::error::Error) -> Self {
        Self::Survey(err)
    }
}

impl From<mongodb::error::Error> for Error {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Survey(err.into())
    }
}

/// Read the articles to import.
fn read_articles(path: &str) -> Result<Vec<NewArticle>, Error> {
    let file = File::open(path).map_err(|err| Error::IO(err.to_string()))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|err| Error::Format(err.to_string()))
}

/// Carry out the chosen subcommand against the database.
async fn execute(db: &Database, args: &ArgMatches) -> Result<(), Error> {
    ensure_indexes_exist(db).await?;

    match args.subcommand() {
        Some((IMPORT, sub_args)) => {
            // Required argument is guaranteed to be present.
            let path: &String = sub_args.get_one(PATH).unwrap();
            let articles = read_articles(path)?;
            let ids = Article::import(&Coll::from_db(db), &articles, TIMEOUT).await?;
            for (id, article) in ids.iter().zip(&articles) {
                println!("{id}  {}", article.title);
            }
            println!("Imported {} articles.", ids.len());
        }
        Some((LIST, _)) => {
            let catalog = Catalog::load(&Coll::from_db(db), TIMEOUT).await?;
            for article in catalog.articles() {
                println!("{}  {}  {}", article.id, article.title, article.image_ref);
            }
            println!("{} articles.", catalog.len());
        }
        Some((command @ (GRANT | REVOKE), sub_args)) => {
            let identity: &String = sub_args.get_one(IDENTITY).unwrap();
            let grant = command == GRANT;
            Participant::set_admin(&Coll::from_db(db), identity, grant, TIMEOUT).await?;
            if grant {
                println!("{identity} may now export statistics.");
            } else {
                println!("{identity} may no longer export statistics.");
            }
        }
        // `subcommand_required` rules this out.
        _ => unreachable!(),
    }
    Ok(())
}

/// Connect, run the subcommand, report the result, and return the exit code.
async fn run(args: &ArgMatches) -> u8 {
    let db_uri = match args
        .get_one::<String>(DB_URI)
        .or_else(|| args.subcommand().and_then(|(_, sub)| sub.get_one(DB_URI)))
        .cloned()
        .or_else(|| std::env::var(DB_URI_ENV).ok())
    {
        Some(db_uri) => db_uri,
        None => {
            println!("No database given: pass --db-uri or set ${DB_URI_ENV}.");
            return 1;
        }
    };

    let client = match connect(&db_uri, TIMEOUT).await {
        Ok(client) => client,
        Err(err) => {
            println!("Could not connect to the database: {err}");
            return 2;
        }
    };

    match execute(&client.database(DATABASE), args).await {
        Ok(()) => 0,
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {msg}");
            1
        }
        Err(Error::Survey(err)) => {
            println!("Failed: {err}");
            2
        }
    }
}

#[rocket::main]
async fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args).await;
    std::process::exit(exit_code.into())
}
