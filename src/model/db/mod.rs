//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Maps keyed by IDs use the hex form of the ID as the key.

pub mod article;
pub mod participant;
