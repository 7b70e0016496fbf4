//! The survey progression engine: the article catalog, next-article
//! assignment and rating submission.

pub mod assignment;
pub mod catalog;
pub mod rating;

pub use assignment::{is_complete, is_eligible, next_article, NextArticle};
pub use catalog::Catalog;
pub use rating::Rating;
