use std::ops::Deref;

use log::info;
use rocket::tokio::time::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::{bounded, Coll, Id};

/// Core article data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleCore {
    /// Headline shown to every participant.
    pub title: String,
    /// Code of the illustrative image, only shown to the with-image group.
    pub image_ref: String,
}

/// An article without an ID.
pub type NewArticle = ArticleCore;

/// An article from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub article: ArticleCore,
}

impl Deref for Article {
    type Target = ArticleCore;

    fn deref(&self) -> &Self::Target {
        &self.article
    }
}

impl Article {
    /// Add articles to the catalog, returning their new IDs in input order.
    ///
    /// Only meant for setting up a survey before it opens.
    pub async fn import(
        new_articles: &Coll<NewArticle>,
        articles: &[NewArticle],
        limit: Duration,
    ) -> Result<Vec<Id>> {
        if articles.is_empty() {
            return Ok(Vec::new());
        }

        let result = bounded(
            limit,
            "import articles",
            new_articles.insert_many(articles, None),
        )
        .await?;
        let mut inserted: Vec<_> = result.inserted_ids.into_iter().collect();
        inserted.sort_by_key(|(index, _)| *index);

        let ids = inserted
            .into_iter()
            .map(|(_, id)| {
                id.as_object_id()
                    .map(Id::from)
                    .ok_or_else(|| Error::not_found(format!("ObjectId for inserted article {id}")))
            })
            .collect::<Result<Vec<_>>>()?;
        info!("Imported {} articles", ids.len());
        Ok(ids)
    }
}
