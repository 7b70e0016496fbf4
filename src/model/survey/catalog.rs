use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, tokio::time::Duration};

use crate::error::Result;
use crate::model::{
    db::article::Article,
    mongodb::{bounded, Coll, Id},
};

/// The fixed set of ratable articles, ordered by ID.
///
/// The order is only used to give the statistics export stable columns;
/// article selection does not depend on it.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    articles: Vec<Article>,
}

impl Catalog {
    pub fn new(mut articles: Vec<Article>) -> Self {
        articles.sort_by_key(|article| article.id);
        articles.dedup_by_key(|article| article.id);
        Self { articles }
    }

    /// Load the current catalog from the database.
    pub async fn load(articles: &Coll<Article>, limit: Duration) -> Result<Self> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let all = bounded(limit, "load catalog", async {
            articles.find(None, options).await?.try_collect().await
        })
        .await?;
        Ok(Self::new(all))
    }

    pub fn get(&self, id: &Id) -> Option<&Article> {
        self.articles
            .binary_search_by_key(id, |article| article.id)
            .ok()
            .map(|index| &self.articles[index])
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.get(id).is_some()
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn ids(&self) -> impl Iterator<Item = Id> + '_ {
        self.articles.iter().map(|article| article.id)
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

#[cfg(test)]
mod examples {
    use super::*;

    use crate::model::db::article::ArticleCore;

    impl Catalog {
        /// A catalog of `n` example articles.
        pub fn example(n: usize) -> Self {
            let articles = (0..n)
                .map(|i| Article {
                    id: Id::new(),
                    article: ArticleCore {
                        title: format!("Article {i}"),
                        image_ref: format!("image-{i}"),
                    },
                })
                .collect();
            Self::new(articles)
        }
    }
}
