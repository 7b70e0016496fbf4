mod identity;
mod state;
mod token;

#[cfg(test)]
pub use identity::{TEST_ADMIN, TEST_PARTICIPANT};
pub use identity::{IdentityProvider, VerifiedIdentity};
pub use state::{SignInState, SignInStateError, SIGN_IN_COOKIE};
pub use token::{SessionToken, SESSION_COOKIE};
