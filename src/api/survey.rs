use log::{debug, info};
use rocket::{
    form::Form,
    http::{uri::Origin, Cookie, CookieJar},
    response::Redirect,
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::SESSION_COOKIE,
            survey::{CompletePage, QuestionPage, RatingForm, StartPage},
        },
        db::{article::Article, participant::Participant},
        mongodb::{Coll, Id},
        survey::{is_complete, is_eligible, next_article, Catalog, NextArticle, Rating},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![
        start,
        question,
        unknown_question,
        submit,
        submit_elsewhere,
        complete,
        submit_final
    ]
}

/// Any page of the survey flow.
#[derive(Responder)]
pub enum SurveyPage {
    Question(Json<QuestionPage>),
    Complete(Json<CompletePage>),
    Elsewhere(Redirect),
}

/// Path of the page that shows `next`.
pub fn next_path(next: NextArticle) -> Origin<'static> {
    match next {
        NextArticle::Article(id) => uri!(question(id)),
        NextArticle::Complete => uri!(complete),
    }
}

/// Send the participant wherever they should be now.
fn redirect_onwards(participant: &Participant, catalog: &Catalog) -> SurveyPage {
    let next = next_article(
        &participant.responses,
        catalog,
        None,
        &mut rand::thread_rng(),
    );
    SurveyPage::Elsewhere(Redirect::to(next_path(next)))
}

/// The question page for `id`, or a redirect if that article can't be offered.
fn show_question(id: Id, participant: &Participant, catalog: &Catalog) -> SurveyPage {
    match catalog.get(&id) {
        Some(article) if is_eligible(&id, &participant.responses, catalog) => {
            // The form posts to the page after this one, which must not be this one.
            let next = next_article(
                &participant.responses,
                catalog,
                Some(id),
                &mut rand::thread_rng(),
            );
            let page = QuestionPage::new(article, participant.group, next_path(next).to_string());
            SurveyPage::Question(Json(page))
        }
        _ => {
            debug!(
                "Article {id} is not available to participant {}",
                participant.id
            );
            redirect_onwards(participant, catalog)
        }
    }
}

/// Store a submitted rating unless the article was rated already, and return
/// the participant as they now stand.
async fn record_rating(
    form: &RatingForm<'_>,
    participant: Participant,
    catalog: &Catalog,
    participants: &Coll<Participant>,
    config: &Config,
) -> Result<Participant> {
    let rating = Rating::parse(form.article_id, form.score)?;
    if !catalog.contains(&rating.article) {
        return Err(Error::validation(format!(
            "No article with ID {}",
            rating.article
        )));
    }
    if participant.responses.is_rated(&rating.article) {
        info!(
            "Participant {} already rated article {}, ignoring resubmission",
            participant.id, rating.article
        );
        return Ok(participant);
    }

    rating
        .store(participants, participant.id, config.db_timeout())
        .await?;

    // Re-read so the next choice sees every rating that has landed so far.
    Participant::by_id(participants, participant.id, config.db_timeout())
        .await?
        .ok_or_else(|| Error::not_found(format!("Participant {}", participant.id)))
}

/// End the survey if every article is rated, otherwise carry on.
fn finish(participant: &Participant, catalog: &Catalog, cookies: &CookieJar<'_>) -> SurveyPage {
    if is_complete(&participant.responses, catalog) {
        info!("Participant {} completed the survey", participant.id);
        cookies.remove_private(Cookie::named(SESSION_COOKIE));
        SurveyPage::Complete(Json(CompletePage { complete: true }))
    } else {
        redirect_onwards(participant, catalog)
    }
}

#[get("/survey/start")]
pub async fn start(
    participant: Participant,
    articles: Coll<Article>,
    config: &State<Config>,
) -> Result<Json<StartPage>> {
    let catalog = Catalog::load(&articles, config.db_timeout()).await?;
    let next = next_article(
        &participant.responses,
        &catalog,
        None,
        &mut rand::thread_rng(),
    );
    Ok(Json(StartPage {
        next_path: next_path(next).to_string(),
    }))
}

#[get("/survey/<id>")]
pub async fn question(
    id: Id,
    participant: Participant,
    articles: Coll<Article>,
    config: &State<Config>,
) -> Result<SurveyPage> {
    let catalog = Catalog::load(&articles, config.db_timeout()).await?;
    Ok(show_question(id, &participant, &catalog))
}

/// Anything under `/survey/` that isn't an article ID.
#[get("/survey/<_>", rank = 3)]
pub async fn unknown_question(
    participant: Participant,
    articles: Coll<Article>,
    config: &State<Config>,
) -> Result<SurveyPage> {
    let catalog = Catalog::load(&articles, config.db_timeout()).await?;
    Ok(redirect_onwards(&participant, &catalog))
}

#[post("/survey/<id>", data = "<form>")]
pub async fn submit(
    id: Id,
    form: Form<RatingForm<'_>>,
    participant: Participant,
    articles: Coll<Article>,
    participants: Coll<Participant>,
    config: &State<Config>,
) -> Result<SurveyPage> {
    let catalog = Catalog::load(&articles, config.db_timeout()).await?;
    let participant = record_rating(&form, participant, &catalog, &participants, config).await?;
    Ok(show_question(id, &participant, &catalog))
}

/// A rating posted to anything under `/survey/` that isn't an article ID.
#[post("/survey/<_>", data = "<form>", rank = 3)]
pub async fn submit_elsewhere(
    form: Form<RatingForm<'_>>,
    participant: Participant,
    articles: Coll<Article>,
    participants: Coll<Participant>,
    config: &State<Config>,
) -> Result<SurveyPage> {
    let catalog = Catalog::load(&articles, config.db_timeout()).await?;
    let participant = record_rating(&form, participant, &catalog, &participants, config).await?;
    Ok(redirect_onwards(&participant, &catalog))
}

#[get("/survey/complete")]
pub async fn complete(
    participant: Participant,
    cookies: &CookieJar<'_>,
    articles: Coll<Article>,
    config: &State<Config>,
) -> Result<SurveyPage> {
    let catalog = Catalog::load(&articles, config.db_timeout()).await?;
    Ok(finish(&participant, &catalog, cookies))
}

#[post("/survey/complete", data = "<form>")]
pub async fn submit_final(
    form: Form<RatingForm<'_>>,
    participant: Participant,
    cookies: &CookieJar<'_>,
    articles: Coll<Article>,
    participants: Coll<Participant>,
    config: &State<Config>,
) -> Result<SurveyPage> {
    let catalog = Catalog::load(&articles, config.db_timeout()).await?;
    let participant = record_rating(&form, participant, &catalog, &participants, config).await?;
    Ok(finish(&participant, &catalog, cookies))
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::{Client, LocalResponse},
        serde::json::Value,
    };

    use crate::model::{
        api::auth::TEST_PARTICIPANT,
        common::group::Group,
        db::article::{ArticleCore, NewArticle},
    };

    use super::*;

    /// Insert articles, returning their IDs in insertion order.
    async fn insert_articles(
        new_articles: &Coll<NewArticle>,
        articles: Vec<ArticleCore>,
    ) -> Vec<Id> {
        let mut inserted: Vec<_> = new_articles
            .insert_many(articles, None)
            .await
            .unwrap()
            .inserted_ids
            .into_iter()
            .collect();
        inserted.sort_by_key(|(index, _)| *index);
        inserted
            .into_iter()
            .map(|(_, id)| id.as_object_id().unwrap().into())
            .collect()
    }

    async fn me(participants: &Coll<Participant>) -> Participant {
        participants
            .find_one(doc! { "identity": TEST_PARTICIPANT }, None)
            .await
            .unwrap()
            .unwrap()
    }

    async fn rate<'c>(
        client: &'c Client,
        path: &str,
        article: Id,
        score: &str,
    ) -> LocalResponse<'c> {
        client
            .post(path.to_string())
            .header(ContentType::Form)
            .body(format!("article_id={article}&score={score}"))
            .dispatch()
            .await
    }

    fn location<'a>(response: &'a LocalResponse<'_>) -> Option<&'a str> {
        response.headers().get_one("Location")
    }

    fn article_of(path: &str) -> Id {
        path.trim_start_matches("/survey/").parse().unwrap()
    }

    #[backend_test(participant)]
    async fn two_article_walk(
        client: Client,
        new_articles: Coll<NewArticle>,
        participants: Coll<Participant>,
    ) {
        let ids = insert_articles(
            &new_articles,
            vec![ArticleCore::example(), ArticleCore::example2()],
        )
        .await;

        let response = client.get(uri!(start)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let start_page: Value = response.into_json().await.unwrap();
        let first_path = start_page["next_path"].as_str().unwrap().to_string();
        let first = article_of(&first_path);
        assert!(ids.contains(&first));

        // The first question points at the other article.
        let response = client.get(first_path.clone()).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let page: Value = response.into_json().await.unwrap();
        assert_eq!(page["article_id"], first.to_string());
        assert_eq!(page["scale"], rocket::serde::json::json!([1, 2, 3, 4, 5]));
        let second_path = page["next_path"].as_str().unwrap().to_string();
        let second = article_of(&second_path);
        assert_ne!(first, second);
        assert!(ids.contains(&second));

        // Rating the first article shows the second, which leads to completion.
        let response = rate(&client, &second_path, first, "3").await;
        assert_eq!(Status::Ok, response.status());
        let page: Value = response.into_json().await.unwrap();
        assert_eq!(page["article_id"], second.to_string());
        assert_eq!(page["next_path"], uri!(complete).to_string());

        let response = rate(&client, &uri!(complete).to_string(), second, "5").await;
        assert_eq!(Status::Ok, response.status());
        let page: Value = response.into_json().await.unwrap();
        assert_eq!(page["complete"], true);
        assert!(client.cookies().get_private(SESSION_COOKIE).is_none());

        let participant = me(&participants).await;
        assert_eq!(participant.responses.len(), 2);
        assert_eq!(participant.responses[&first].value(), 3);
        assert_eq!(participant.responses[&second].value(), 5);
    }

    #[backend_test(participant)]
    async fn image_follows_group(
        client: Client,
        new_articles: Coll<NewArticle>,
        participants: Coll<Participant>,
    ) {
        let ids = insert_articles(&new_articles, vec![ArticleCore::example()]).await;
        let group = me(&participants).await.group;

        let response = client.get(uri!(question(ids[0]))).dispatch().await;
        let page: Value = response.into_json().await.unwrap();
        assert_eq!(page["image_shown"], group == Group::WithImage);
        match group {
            Group::WithImage => assert_eq!(page["image_ref"], ArticleCore::example().image_ref),
            Group::NoImage => assert!(page.get("image_ref").is_none()),
        }
    }

    #[backend_test(participant)]
    async fn rated_article_redirects(client: Client, new_articles: Coll<NewArticle>) {
        let ids = insert_articles(
            &new_articles,
            vec![ArticleCore::example(), ArticleCore::example2()],
        )
        .await;

        rate(&client, &uri!(question(ids[1])).to_string(), ids[0], "4").await;

        let response = client.get(uri!(question(ids[0]))).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(
            Some(uri!(question(ids[1])).to_string().as_str()),
            location(&response)
        );
    }

    #[backend_test(participant)]
    async fn unknown_paths_redirect(client: Client, new_articles: Coll<NewArticle>) {
        let ids = insert_articles(&new_articles, vec![ArticleCore::example()]).await;
        let expected = uri!(question(ids[0])).to_string();

        let response = client.get("/survey/not-an-article").dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some(expected.as_str()), location(&response));

        let response = client.get(uri!(question(Id::new()))).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(Some(expected.as_str()), location(&response));
    }

    #[backend_test(participant)]
    async fn bad_scores_are_rejected(
        client: Client,
        new_articles: Coll<NewArticle>,
        participants: Coll<Participant>,
    ) {
        let ids = insert_articles(&new_articles, vec![ArticleCore::example()]).await;
        let path = uri!(complete).to_string();

        for score in ["0", "6", "three", ""] {
            let response = rate(&client, &path, ids[0], score).await;
            assert_eq!(Status::BadRequest, response.status());
        }
        let response = rate(&client, &path, Id::new(), "3").await;
        assert_eq!(Status::BadRequest, response.status());

        assert!(me(&participants).await.responses.is_empty());
    }

    #[backend_test(participant)]
    async fn resubmission_is_ignored(
        client: Client,
        new_articles: Coll<NewArticle>,
        participants: Coll<Participant>,
    ) {
        let ids = insert_articles(
            &new_articles,
            vec![ArticleCore::example(), ArticleCore::example2()],
        )
        .await;
        let path = uri!(question(ids[1])).to_string();

        rate(&client, &path, ids[0], "2").await;
        let response = rate(&client, &path, ids[0], "5").await;
        assert_eq!(Status::Ok, response.status());

        let participant = me(&participants).await;
        assert_eq!(participant.responses.len(), 1);
        assert_eq!(participant.responses[&ids[0]].value(), 2);
    }

    #[backend_test(participant)]
    async fn incomplete_participant_cannot_finish(client: Client, new_articles: Coll<NewArticle>) {
        let ids = insert_articles(&new_articles, vec![ArticleCore::example()]).await;

        let response = client.get(uri!(complete)).dispatch().await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(
            Some(uri!(question(ids[0])).to_string().as_str()),
            location(&response)
        );
        assert!(client.cookies().get_private(SESSION_COOKIE).is_some());
    }

    #[backend_test(participant)]
    async fn empty_catalog_completes_immediately(client: Client) {
        let response = client.get(uri!(start)).dispatch().await;
        let page: Value = response.into_json().await.unwrap();
        assert_eq!(page["next_path"], uri!(complete).to_string());

        let response = client.get(uri!(complete)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let page: Value = response.into_json().await.unwrap();
        assert_eq!(page["complete"], true);
    }

    #[backend_test(participant)]
    async fn rating_posted_to_unknown_path_is_kept(
        client: Client,
        new_articles: Coll<NewArticle>,
        participants: Coll<Participant>,
    ) {
        let ids = insert_articles(
            &new_articles,
            vec![ArticleCore::example(), ArticleCore::example2()],
        )
        .await;

        let response = rate(&client, "/survey/not-an-article", ids[0], "4").await;
        assert_eq!(Status::SeeOther, response.status());
        assert_eq!(
            Some(uri!(question(ids[1])).to_string().as_str()),
            location(&response)
        );

        let participant = me(&participants).await;
        assert_eq!(participant.responses.len(), 1);
        assert_eq!(participant.responses[&ids[0]].value(), 4);
    }

    #[backend_test(participant)]
    async fn deleted_participant_is_signed_out(
        client: Client,
        participants: Coll<Participant>,
    ) {
        let deleted = participants
            .delete_one(doc! { "identity": TEST_PARTICIPANT }, None)
            .await
            .unwrap();
        assert_eq!(deleted.deleted_count, 1);

        // The session cookie is still valid, but names nobody.
        assert!(client.cookies().get_private(SESSION_COOKIE).is_some());
        let response = client.get(uri!(start)).dispatch().await;
        assert_eq!(Some("/"), location(&response));
    }

    #[backend_test]
    async fn requires_session(client: Client) {
        let response = client.get(uri!(start)).dispatch().await;
        assert_eq!(Some("/"), location(&response));

        let response = client.get(uri!(complete)).dispatch().await;
        assert_eq!(Some("/"), location(&response));
    }
}
