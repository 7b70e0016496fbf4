use std::future::Future;

use mongodb::error::Error as DbError;
use rocket::tokio::time::{self, Duration};

use crate::error::{Error, Result};

/// Await a database operation, failing with [`Error::Timeout`] if it does not
/// finish within `limit`.
///
/// The driver's own timeouts only cover server selection and connection, so a
/// stalled operation on an established connection would otherwise hang the request.
pub async fn bounded<T, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, DbError>>,
{
    match time::timeout(limit, fut).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(Error::Timeout(operation.to_string())),
    }
}
