//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Optional fields are omitted rather than sent as `null`.

pub mod auth;
pub mod statistics;
pub mod survey;
