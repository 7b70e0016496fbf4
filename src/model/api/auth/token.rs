use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use log::{debug, warn};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{FromRequest, Outcome},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    db::participant::Participant,
    mongodb::{Coll, Id},
};

pub const SESSION_COOKIE: &str = "session";

/// A session token naming the signed-in participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    #[serde(rename = "sub")]
    pub id: Id,
}

impl SessionToken {
    pub fn new(participant: &Participant) -> Self {
        Self { id: participant.id }
    }

    #[allow(clippy::missing_panics_doc)]
    /// Serialize this token into a cookie. This must be added to the jar as a
    /// private cookie, which keeps it opaque to the browser.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            token: self,
            expire_at: Utc::now() + config.session_ttl(),
        };

        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.session_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        Cookie::build(SESSION_COOKIE, token)
            .max_age(Duration::seconds(config.session_ttl().num_seconds()))
            .http_only(true)
            // Set by the redirect back from the identity provider.
            .same_site(SameSite::Lax)
            .finish()
    }

    /// Deserialize a token from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self, Error> {
        let token = jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.session_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.token)?;
        Ok(token)
    }
}

/// Cookie claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    token: SessionToken,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SessionToken {
    type Error = Error;

    /// Get a [`SessionToken`] from the cookie, failing if it is missing, forged or expired.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let cookie = try_outcome!(req.cookies().get_private(SESSION_COOKIE).into_outcome((
            Status::Unauthorized,
            Error::unauthenticated(format!("Missing `{SESSION_COOKIE}` cookie")),
        )));

        Self::from_cookie(&cookie, config).into_outcome(Status::Unauthorized)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Participant {
    type Error = Error;

    /// Load the signed-in participant afresh from the database.
    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = try_outcome!(req.guard::<SessionToken>().await);
        let config = req.guard::<&State<Config>>().await.unwrap();
        let db = req.guard::<&State<mongodb::Database>>().await.unwrap();
        let participants = Coll::<Participant>::from_db(db);

        match Participant::by_id(&participants, token.id, config.db_timeout()).await {
            Ok(Some(participant)) => {
                debug!("Request from participant {}", participant.id);
                Outcome::Success(participant)
            }
            // A session for a record that no longer exists is no session at all.
            Ok(None) => {
                warn!("Session names unknown participant {}", token.id);
                Outcome::Failure((
                    Status::Unauthorized,
                    Error::unauthenticated("Unknown participant"),
                ))
            }
            Err(e) => Outcome::Failure((e.status(), e)),
        }
    }
}
