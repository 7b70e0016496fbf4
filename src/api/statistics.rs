use log::{info, warn};
use rocket::{http::ContentType, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::statistics::export_csv,
        db::{article::Article, participant::Participant},
        mongodb::Coll,
        survey::Catalog,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![statistics]
}

#[get("/statistics.csv")]
pub async fn statistics(
    participant: Participant,
    articles: Coll<Article>,
    participants: Coll<Participant>,
    config: &State<Config>,
) -> Result<(ContentType, String)> {
    if !participant.is_admin {
        warn!(
            "Participant {} requested statistics without admin rights",
            participant.id
        );
        return Err(Error::forbidden("Statistics are only available to admins"));
    }

    let catalog = Catalog::load(&articles, config.db_timeout()).await?;
    let csv = export_csv(&catalog, &participants, config.db_timeout()).await?;
    info!("Admin {} exported statistics", participant.id);
    Ok((ContentType::CSV, csv))
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;
    use rocket::{http::Status, local::asynchronous::Client};

    use crate::model::{
        db::{
            article::{ArticleCore, NewArticle},
            participant::NewParticipant,
        },
        mongodb::Id,
    };

    use super::*;

    #[backend_test(participant)]
    async fn participants_are_forbidden(client: Client) {
        let response = client.get(uri!(statistics)).dispatch().await;
        assert_eq!(Status::Forbidden, response.status());
    }

    #[backend_test]
    async fn requires_session(client: Client) {
        let response = client.get(uri!(statistics)).dispatch().await;
        assert_eq!(Some("/"), response.headers().get_one("Location"));
    }

    #[backend_test(admin)]
    async fn admin_exports_csv(
        client: Client,
        new_articles: Coll<NewArticle>,
        participants: Coll<Participant>,
        new_participants: Coll<NewParticipant>,
    ) {
        let article: Id = new_articles
            .insert_one(ArticleCore::example(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        let student: Id = new_participants
            .insert_one(NewParticipant::example(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into();
        participants
            .update_one(
                student.as_doc(),
                doc! { "$set": { format!("responses.{article}"): 4 } },
                None,
            )
            .await
            .unwrap();

        let response = client.get(uri!(statistics)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        assert_eq!(Some(ContentType::CSV), response.content_type());

        let csv = response.into_string().await.unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, [format!("imagePresent,{article}"), "true,4".to_string()]);
    }
}
