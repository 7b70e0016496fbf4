use chrono::Utc;
use log::{debug, error};
use mongodb::bson::{doc, DateTime as BsonDateTime};
use rocket::tokio::time::Duration;

use crate::error::{Error, Result};
use crate::model::{
    common::score::Score,
    db::participant::Participant,
    mongodb::{bounded, Coll, Id},
};

/// A validated (article, score) pair, ready to be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rating {
    pub article: Id,
    pub score: Score,
}

impl Rating {
    /// Validate a raw article ID and score.
    pub fn new(article: &str, score: i64) -> Result<Self> {
        let article = article
            .trim()
            .parse::<Id>()
            .map_err(|_| Error::validation(format!("Malformed article ID '{article}'")))?;
        let score = Score::try_from(score).map_err(|e| Error::validation(e.to_string()))?;
        Ok(Self { article, score })
    }

    /// Validate a rating as submitted through a form, where the score is still text.
    pub fn parse(article: &str, score: &str) -> Result<Self> {
        let score = score
            .trim()
            .parse::<i64>()
            .map_err(|_| Error::validation(format!("Score '{score}' is not a whole number")))?;
        Self::new(article, score)
    }

    /// Path of this rating's entry within a participant document.
    /// Only ever built from a parsed [`Id`], so it cannot address any other field.
    fn response_field(&self) -> String {
        format!("responses.{}", self.article)
    }

    /// Store this rating against the given participant.
    ///
    /// This is a single field set addressed by primary key, so concurrent ratings of
    /// different articles by the same participant never clobber each other. Rating an
    /// article twice overwrites the earlier score; callers that must not re-rate have
    /// to check the participant's responses first.
    pub async fn store(
        &self,
        participants: &Coll<Participant>,
        participant: Id,
        limit: Duration,
    ) -> Result<()> {
        let update = doc! {
            "$set": {
                self.response_field(): self.score,
                "updated_at": BsonDateTime::from_chrono(Utc::now()),
            }
        };

        let result = bounded(
            limit,
            "submit rating",
            participants.update_one(participant.as_doc(), update, None),
        )
        .await
        .map_err(|e| {
            error!(
                "Failed to store score {} for article {} by participant {participant}: {e}",
                self.score, self.article
            );
            e
        })?;

        if result.matched_count != 1 {
            error!(
                "Participant {participant} vanished before storing score for article {}",
                self.article
            );
            return Err(Error::not_found(format!("Participant {participant}")));
        }

        debug!(
            "Participant {participant} rated article {} as {}",
            self.article, self.score
        );
        Ok(())
    }
}
