//! Fundi authentication service
//!
//! Session lifecycle for the marketplace backend: signup with email
//! verification, password and external-identity login, token refresh
//! and revocation, password change and reset.

pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod notify;
pub mod oauth;
pub mod otp;
pub mod password;
pub mod rate_limiter;
pub mod repositories;
pub mod routes;
pub mod service;
pub mod token;
pub mod validation;
pub mod wrap;
