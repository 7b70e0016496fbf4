use std::fmt::Write;

use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, tokio::time::Duration};

use crate::error::Result;
use crate::model::{
    db::participant::Participant,
    mongodb::{bounded, Coll},
    survey::Catalog,
};

/// Header of the first column: whether the participant saw images.
pub const IMAGE_COLUMN: &str = "imagePresent";

/// Anonymised raw responses, one row per non-admin participant and one column
/// per catalog article.
///
/// Every field is a hex ID, a boolean or a small integer, so nothing needs quoting.
pub fn render_csv<'a>(
    catalog: &Catalog,
    participants: impl IntoIterator<Item = &'a Participant>,
) -> String {
    let mut csv = String::from(IMAGE_COLUMN);
    for id in catalog.ids() {
        // Writing to a `String` cannot fail.
        let _ = write!(csv, ",{id}");
    }
    csv.push('\n');

    for participant in participants.into_iter().filter(|p| !p.is_admin) {
        let _ = write!(csv, "{}", participant.group.image_shown());
        for id in catalog.ids() {
            csv.push(',');
            if let Some(score) = participant.responses.get(&id) {
                let _ = write!(csv, "{score}");
            }
        }
        csv.push('\n');
    }
    csv
}

/// Load every non-admin participant and render the export.
pub async fn export_csv(
    catalog: &Catalog,
    participants: &Coll<Participant>,
    limit: Duration,
) -> Result<String> {
    let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
    let rows: Vec<Participant> = bounded(limit, "load participants", async {
        participants
            .find(doc! { "is_admin": false }, options)
            .await?
            .try_collect()
            .await
    })
    .await?;
    Ok(render_csv(catalog, &rows))
}
