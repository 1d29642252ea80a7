//! Core data models for the media gateway.
//!
//! `claims` and `decision` describe a single request's passage through the
//! authorization pipeline. `bucket` and `object` map the disk backend's
//! SQLite tables via `sqlx::FromRow`.

pub mod bucket;
pub mod claims;
pub mod decision;
pub mod object;
