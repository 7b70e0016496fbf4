use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    article::{Article, NewArticle},
    participant::{NewParticipant, Participant},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Article collections
const ARTICLES: &str = "articles";
impl MongoCollection for Article {
    const NAME: &'static str = ARTICLES;
}
impl MongoCollection for NewArticle {
    const NAME: &'static str = ARTICLES;
}

// Participant collections
const PARTICIPANTS: &str = "participants";
impl MongoCollection for Participant {
    const NAME: &'static str = PARTICIPANTS;
}
impl MongoCollection for NewParticipant {
    const NAME: &'static str = PARTICIPANTS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // One participant record per signed-in identity.
    let participant_index = IndexModel::builder()
        .keys(doc! {"identity": 1})
        .options(unique)
        .build();
    Coll::<Participant>::from_db(db)
        .create_index(participant_index, None)
        .await?;

    // Used by the statistics export.
    let admin_index = IndexModel::builder().keys(doc! {"is_admin": 1}).build();
    Coll::<Participant>::from_db(db)
        .create_index(admin_index, None)
        .await?;

    Ok(())
}
