use reqwest::{Client, Url};
use rocket::tokio::time::Duration;
use serde::Deserialize;

use crate::config::Config;
use crate::error::{Error, Result};

use super::state::SignInState;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
#[cfg_attr(test, allow(dead_code))]
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
#[cfg_attr(test, allow(dead_code))]
const USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";
const SCOPES: &str = "https://www.googleapis.com/auth/userinfo.profile \
                      https://www.googleapis.com/auth/userinfo.email";

/// In test mode, an authorisation code is just the email address to sign in as.
#[cfg(test)]
pub const TEST_PARTICIPANT: &str = "student@student.example.edu";

/// Signs in as the example admin participant.
#[cfg(test)]
pub const TEST_ADMIN: &str = "coordinator@student.example.edu";

/// The identity the provider vouched for.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerifiedIdentity {
    pub email: String,
    /// Present only for accounts managed by an organisation.
    #[serde(rename = "hd")]
    pub hosted_domain: Option<String>,
    #[serde(default = "default_verified")]
    email_verified: bool,
}

fn default_verified() -> bool {
    true
}

impl VerifiedIdentity {
    /// Is this account managed by the given organisation?
    pub fn belongs_to(&self, domain: &str) -> bool {
        self.email_verified
            && self
                .hosted_domain
                .as_deref()
                .map_or(false, |hd| hd.eq_ignore_ascii_case(domain))
    }
}

#[derive(Deserialize)]
#[cfg_attr(test, allow(dead_code))]
struct TokenResponse {
    access_token: String,
}

/// Client for Google's OAuth endpoints. Every call is bounded by the
/// configured identity provider timeout.
pub struct IdentityProvider {
    #[cfg_attr(test, allow(dead_code))]
    client: Client,
}

impl IdentityProvider {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Where the site sends a visitor to sign in.
    pub fn redirect_uri(config: &Config) -> String {
        format!("{}/auth", config.public_url())
    }

    /// The provider's consent page URL for this sign-in attempt.
    pub fn authorize_url(config: &Config, state: &SignInState) -> String {
        let redirect_uri = Self::redirect_uri(config);
        // The base URL is a valid constant, so this cannot fail.
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", config.google_client_id()),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state.nonce.as_str()),
                ("access_type", "online"),
            ],
        )
        .map(String::from)
        .unwrap_or_default();
        url
    }

    /// Exchange an authorisation code for the identity it belongs to.
    #[cfg(not(test))]
    pub async fn verify(&self, code: &str, config: &Config) -> Result<VerifiedIdentity> {
        let redirect_uri = Self::redirect_uri(config);
        let response = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", config.google_client_id()),
                ("client_secret", config.google_client_secret()),
                ("redirect_uri", redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(dependency)?;
        // A rejected code is the visitor's problem; anything else is ours.
        if response.status().is_client_error() {
            return Err(Error::unauthenticated("Authorization unsuccessful"));
        }
        let token: TokenResponse = response
            .error_for_status()
            .map_err(dependency)?
            .json()
            .await
            .map_err(dependency)?;

        let identity = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(token.access_token)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(dependency)?
            .json()
            .await
            .map_err(dependency)?;
        Ok(identity)
    }

    /// Exchange an authorisation code for the identity it belongs to.
    ///
    /// In test mode the code is the email address itself, and the hosted domain
    /// is taken from it.
    #[cfg(test)]
    pub async fn verify(&self, code: &str, _config: &Config) -> Result<VerifiedIdentity> {
        match code.split_once('@') {
            Some((user, domain)) if !user.is_empty() && !domain.is_empty() => {
                Ok(VerifiedIdentity {
                    email: code.to_string(),
                    hosted_domain: Some(domain.to_string()),
                    email_verified: true,
                })
            }
            _ => Err(Error::unauthenticated("Authorization unsuccessful")),
        }
    }
}

#[cfg(not(test))]
fn dependency(err: reqwest::Error) -> Error {
    log::error!("Identity provider call failed: {err}");
    Error::Http(err)
}
