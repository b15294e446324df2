//! Crucible Postgres store
//!
//! Postgres-backed implementation of the engine's persistence capability.
//! `PgStore` opens one database transaction per unit of work; commit maps to
//! `COMMIT`, and a dropped unit of work rolls the transaction back.

pub mod db;
pub mod repository;

pub use repository::PgStore;
