use jsonwebtoken::errors::Error as JwtError;
use log::{debug, error};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    Request,
};
use thiserror::Error;

use crate::logging::RequestId;

pub type Result<T> = std::result::Result<T, Error>;

/// Body sent in place of any server-side failure detail.
pub const RETRY_LATER: &str = "An unknown error has occurred, please try again later";

#[derive(Debug, Error)]
pub enum Error {
    /// The database failed.
    #[error(transparent)]
    Db(#[from] DbError),
    /// The identity provider could not be reached or answered nonsense.
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    /// A session token failed to decode or has expired.
    #[error(transparent)]
    Jwt(#[from] JwtError),
    /// A dependency did not answer in time.
    #[error("Timed out during {0}")]
    Timeout(String),
    /// A record we were relying on disappeared mid-request.
    #[error("Not found: {0}")]
    NotFound(String),
    /// A client-facing failure with a specific status.
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Malformed input, rejected before touching storage.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, msg.into())
    }

    /// Missing or invalid session, or a forged sign-in.
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Status(Status::Unauthorized, msg.into())
    }

    /// Signed in, but not allowed to do this.
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Status(Status::Forbidden, msg.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Db(_) | Self::Http(_) | Self::Timeout(_) => Status::ServiceUnavailable,
            Self::Jwt(_) => Status::Unauthorized,
            Self::NotFound(_) => Status::InternalServerError,
            Self::Status(status, _) => *status,
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        if status.class() == StatusClass::ServerError {
            // Details stay in the log; the client only learns to retry.
            error!("{} {} {}: {self}", RequestId::of(req), req.method(), req.uri());
            (status, RETRY_LATER).respond_to(req)
        } else {
            debug!("{} {} {}: {self}", RequestId::of(req), req.method(), req.uri());
            (status, self.to_string()).respond_to(req)
        }
    }
}
