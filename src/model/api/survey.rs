use rocket::FromForm;
use serde::Serialize;

use crate::model::{
    common::{group::Group, score::Score},
    db::article::Article,
};

/// The sign-in entry page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LandingPage {
    pub login_url: String,
}

/// Shown to visitors whose account is not managed by the required domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrongAccountPage {
    pub required_domain: String,
}

/// Where to go from the survey's start page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartPage {
    pub next_path: String,
}

/// Everything needed to render one rating question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionPage {
    /// Hex form of the article ID.
    pub article_id: String,
    pub title: String,
    /// Only sent to participants in the image group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    pub image_shown: bool,
    pub scale: Vec<Score>,
    /// Where the rating form posts to. Never the article on screen.
    pub next_path: String,
}

impl QuestionPage {
    pub fn new(article: &Article, group: Group, next_path: String) -> Self {
        let image_shown = group.image_shown();
        Self {
            article_id: article.id.to_string(),
            title: article.title.clone(),
            image_ref: image_shown.then(|| article.image_ref.clone()),
            image_shown,
            scale: Score::scale(),
            next_path,
        }
    }
}

/// The final page of the survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletePage {
    pub complete: bool,
}

/// A submitted rating form. Both fields stay as text so that malformed values
/// surface as our own validation errors rather than a bare form failure.
#[derive(Debug, FromForm)]
pub struct RatingForm<'r> {
    pub article_id: &'r str,
    pub score: &'r str,
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json::{json, to_value};

    use super::*;

    #[test]
    fn image_only_for_image_group() {
        let article = Article::example();

        let with = QuestionPage::new(&article, Group::WithImage, "/survey/complete".into());
        assert_eq!(with.image_ref.as_deref(), Some(article.image_ref.as_str()));
        assert!(with.image_shown);

        let without = QuestionPage::new(&article, Group::NoImage, "/survey/complete".into());
        assert_eq!(without.image_ref, None);
        assert!(!without.image_shown);
        assert!(to_value(&without).unwrap().get("image_ref").is_none());
    }

    #[test]
    fn question_layout() {
        let article = Article::example();
        let page = QuestionPage::new(&article, Group::WithImage, "/survey/complete".into());
        assert_eq!(
            to_value(&page).unwrap(),
            json!({
                "article_id": article.id.to_string(),
                "title": article.title,
                "image_ref": article.image_ref,
                "image_shown": true,
                "scale": [1, 2, 3, 4, 5],
                "next_path": "/survey/complete",
            })
        );
    }
}
