use chrono::{serde::ts_seconds, DateTime, Utc};
use data_encoding::BASE64URL_NOPAD;
use jsonwebtoken::{
    errors::Error as JwtError, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use rand::RngCore;
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{self, FromRequest},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Config;

pub const SIGN_IN_COOKIE: &str = "sign_in_state";

const NONCE_BYTES: usize = 32;

/// The anti-forgery value that ties an OAuth callback to the browser that
/// started the sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInState {
    #[serde(rename = "non")]
    pub nonce: String,
}

impl SignInState {
    /// Create a new state with a random nonce.
    pub fn new() -> Self {
        let mut bytes = [0; NONCE_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self {
            nonce: BASE64URL_NOPAD.encode(&bytes),
        }
    }

    /// Does the `state` echoed back by the provider match this one?
    pub fn matches(&self, echoed: &str) -> bool {
        self.nonce == echoed
    }

    // Claims serialization never fails.
    #[allow(clippy::missing_panics_doc)]
    /// Convert into a cookie. This must be added to the jar as a private cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            state: self,
            expire_at: Utc::now() + config.sign_in_ttl(),
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.session_secret()),
        )
        .expect("JWT encoding is infallible with default settings");

        Cookie::build(SIGN_IN_COOKIE, token)
            .max_age(Duration::seconds(config.sign_in_ttl().num_seconds()))
            .http_only(true)
            // The provider redirects back cross-site, so `Strict` would drop it.
            .same_site(SameSite::Lax)
            .finish()
    }

    /// Deserialize a state from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self, JwtError> {
        jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.session_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.state)
    }
}

impl Default for SignInState {
    fn default() -> Self {
        Self::new()
    }
}

/// Cookie claims: the state itself plus an expiry datetime.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    state: SignInState,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for SignInState {
    type Error = SignInStateError;

    /// Get the sign-in state from the cookie.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = req.guard::<&State<Config>>().await.unwrap(); // Valid as `Config` is always managed

        let cookie = try_outcome!(req
            .cookies()
            .get_private(SIGN_IN_COOKIE)
            .into_outcome((Status::Unauthorized, SignInStateError::Missing)));

        let state = try_outcome!(SignInState::from_cookie(&cookie, config)
            .map_err(SignInStateError::Jwt)
            .into_outcome(Status::Unauthorized));

        request::Outcome::Success(state)
    }
}

#[derive(Debug, Error)]
pub enum SignInStateError {
    #[error("Missing `{SIGN_IN_COOKIE}` cookie")]
    Missing,
    #[error(transparent)]
    Jwt(#[from] JwtError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonces_are_unique_and_url_safe() {
        let first = SignInState::new();
        let second = SignInState::new();
        assert_ne!(first, second);
        assert_eq!(BASE64URL_NOPAD.decode(first.nonce.as_bytes()).unwrap().len(), NONCE_BYTES);
        assert!(first
            .nonce
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn matching() {
        let state = SignInState::new();
        assert!(state.matches(&state.nonce.clone()));
        assert!(!state.matches(""));
        assert!(!state.matches(&SignInState::new().nonce));
    }
}
