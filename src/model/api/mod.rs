//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.
//! datetimes use the literal `YYYY-MM-DD HH:MM:SS` pattern, interpreted as
//! UTC on both sides of the wire.

pub mod auth;
pub mod datetime;
pub mod election;
pub mod session;
pub mod user;
pub mod vote;
