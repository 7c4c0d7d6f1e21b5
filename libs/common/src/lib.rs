//! Common library for the Fundi marketplace backend
//!
//! Shared infrastructure used across the Fundi services: PostgreSQL
//! connectivity and the error types it surfaces.

pub mod database;
pub mod error;
