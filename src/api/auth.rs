use log::{info, warn};
use rocket::{
    http::{Cookie, CookieJar},
    response::Redirect,
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            auth::{
                IdentityProvider, SessionToken, SignInState, SignInStateError, SIGN_IN_COOKIE,
            },
            survey::{LandingPage, WrongAccountPage},
        },
        db::participant::Participant,
        mongodb::Coll,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![landing, sign_in, wrong_account]
}

#[get("/")]
pub fn landing(cookies: &CookieJar<'_>, config: &State<Config>) -> Json<LandingPage> {
    let state = SignInState::new();
    let login_url = IdentityProvider::authorize_url(config, &state);
    cookies.add_private(state.into_cookie(config));
    Json(LandingPage { login_url })
}

#[get("/auth?<state>&<code>")]
pub async fn sign_in(
    state: &str,
    code: Option<&str>,
    expected: std::result::Result<SignInState, SignInStateError>,
    cookies: &CookieJar<'_>,
    provider: &State<IdentityProvider>,
    participants: Coll<Participant>,
    config: &State<Config>,
) -> Result<Redirect> {
    // Each sign-in state can only be used once, whatever the outcome.
    cookies.remove_private(Cookie::named(SIGN_IN_COOKIE));

    let expected = expected.map_err(|e| Error::unauthenticated(e.to_string()))?;
    if !expected.matches(state) {
        warn!("Sign-in state mismatch, possible forged callback");
        return Err(Error::unauthenticated("Sign-in state mismatch"));
    }
    // The provider leaves out the code when the user declines consent.
    let code = code.ok_or_else(|| Error::unauthenticated("Sign-in was cancelled"))?;

    let identity = provider.verify(code, config).await?;
    if !identity.belongs_to(config.required_domain()) {
        info!(
            "Rejected sign-in by {} from domain {:?}",
            identity.email, identity.hosted_domain
        );
        return Ok(Redirect::to(uri!(wrong_account)));
    }

    let participant =
        Participant::find_or_create(&participants, &identity.email, config.db_timeout()).await?;
    info!(
        "Participant {} signed in (group {})",
        participant.id, participant.group
    );

    cookies.add_private(SessionToken::new(&participant).into_cookie(config));
    Ok(Redirect::to(uri!(crate::api::survey::start)))
}

#[get("/wrong_account")]
pub fn wrong_account(config: &State<Config>) -> Json<WrongAccountPage> {
    Json(WrongAccountPage {
        required_domain: config.required_domain().to_string(),
    })
}
