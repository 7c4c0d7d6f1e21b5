//! Data access for the authentication service

pub mod user;

pub use user::{DirectoryError, PgUserDirectory, UserDirectory};
