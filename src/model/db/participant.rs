use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use log::{debug, info};
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, Bson, DateTime as BsonDateTime},
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use rocket::tokio::time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{group::Group, score::Score},
    mongodb::{bounded, is_duplicate_key_error, serde_string_map, Coll, Id},
};

/// The scores a participant has given so far, keyed by article.
///
/// Presence of a key means the article has been rated. Keys are never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Responses {
    #[serde(with = "serde_string_map")]
    scores: HashMap<Id, Score>,
}

impl Responses {
    /// Record a score for an article that has not been rated yet.
    /// Returns false, leaving the existing score in place, if it already has been.
    pub fn record(&mut self, article: Id, score: Score) -> bool {
        if self.scores.contains_key(&article) {
            return false;
        }
        self.scores.insert(article, score);
        true
    }

    pub fn is_rated(&self, article: &Id) -> bool {
        self.scores.contains_key(article)
    }
}

impl Deref for Responses {
    type Target = HashMap<Id, Score>;

    fn deref(&self) -> &Self::Target {
        &self.scores
    }
}

impl FromIterator<(Id, Score)> for Responses {
    fn from_iter<I: IntoIterator<Item = (Id, Score)>>(iter: I) -> Self {
        let mut responses = Self::default();
        for (article, score) in iter {
            responses.record(article, score);
        }
        responses
    }
}

/// Core participant data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantCore {
    /// Verified email address from sign-in; unique across participants.
    pub identity: String,
    /// Grants access to the statistics export. Only ever set by an operator.
    pub is_admin: bool,
    /// Experimental condition, fixed at creation.
    pub group: Group,
    pub responses: Responses,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl ParticipantCore {
    /// Create a new participant with no responses.
    pub fn new(identity: impl Into<String>, group: Group) -> Self {
        let now = Utc::now();
        Self {
            identity: identity.into(),
            is_admin: false,
            group,
            responses: Responses::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// A participant without an ID.
pub type NewParticipant = ParticipantCore;

/// A participant from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub participant: ParticipantCore,
}

impl Deref for Participant {
    type Target = ParticipantCore;

    fn deref(&self) -> &Self::Target {
        &self.participant
    }
}

impl DerefMut for Participant {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.participant
    }
}

impl From<Group> for Bson {
    fn from(group: Group) -> Self {
        Bson::Int32(group as i32)
    }
}

impl Participant {
    /// Fetch the participant with the given ID, if they still exist.
    pub async fn by_id(
        participants: &Coll<Participant>,
        id: Id,
        limit: Duration,
    ) -> Result<Option<Participant>> {
        bounded(limit, "find participant", participants.find_one(id.as_doc(), None)).await
    }

    /// Return the participant record for `identity`, creating it with a freshly
    /// randomised group if this identity has never signed in before.
    ///
    /// The group is only written on insert, so repeated sign-ins never re-randomise it.
    pub async fn find_or_create(
        participants: &Coll<Participant>,
        identity: &str,
        limit: Duration,
    ) -> Result<Participant> {
        let group = Group::random(&mut rand::thread_rng());
        let now = BsonDateTime::from_chrono(Utc::now());
        let filter = doc! { "identity": identity };
        let update = doc! {
            "$setOnInsert": {
                "is_admin": false,
                "group": group,
                "responses": {},
                "created_at": now,
                "updated_at": now,
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let result = bounded(
            limit,
            "upsert participant",
            participants.find_one_and_update(filter.clone(), update.clone(), options.clone()),
        )
        .await;

        let participant = match result {
            // Two first sign-ins raced and the other one inserted; this attempt now matches it.
            Err(Error::Db(ref e)) if is_duplicate_key_error(e) => {
                debug!("Concurrent first sign-in for {identity}, retrying");
                bounded(
                    limit,
                    "upsert participant",
                    participants.find_one_and_update(filter, update, options),
                )
                .await?
            }
            other => other?,
        };

        // An upsert returning `After` always yields a document.
        participant.ok_or_else(|| Error::not_found(format!("Participant '{identity}'")))
    }

    /// Grant or revoke statistics access for the participant with the given identity.
    ///
    /// The participant must have signed in at least once.
    pub async fn set_admin(
        participants: &Coll<Participant>,
        identity: &str,
        is_admin: bool,
        limit: Duration,
    ) -> Result<()> {
        let result = bounded(
            limit,
            "set admin flag",
            participants.update_one(
                doc! { "identity": identity },
                doc! { "$set": { "is_admin": is_admin } },
                None,
            ),
        )
        .await?;

        if result.matched_count == 0 {
            return Err(Error::not_found(format!("Participant '{identity}'")));
        }
        info!("Set admin rights of {identity} to {is_admin}");
        Ok(())
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ParticipantCore {
        pub fn example() -> Self {
            Self::new("student@student.example.edu", Group::WithImage)
        }

        pub fn example_admin() -> Self {
            Self {
                is_admin: true,
                ..Self::new("coordinator@student.example.edu", Group::NoImage)
            }
        }
    }
}
