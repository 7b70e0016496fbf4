use rocket::{response::Redirect, Catcher, Route};

pub mod auth;
pub mod statistics;
pub mod survey;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(survey::routes());
    routes.extend(statistics::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![unauthenticated]
}

/// Anyone without a valid session is sent back to sign in.
#[catch(401)]
fn unauthenticated() -> Redirect {
    Redirect::to(uri!(auth::landing))
}
