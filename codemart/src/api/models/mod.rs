//! API request and response data models.
//!
//! These are the JSON shapes at the HTTP boundary. They are distinct from the records in
//! [`crate::db::models`]; conversions go through `From<UserDBResponse>` so the stored verifier
//! and verification token never reach a response body.
//!
//! - [`auth`]: registration, login, logout, verification and password change
//! - [`users`]: profile and identity views
//! - [`pagination`]: skip/limit query parameters for list endpoints

pub mod auth;
pub mod pagination;
pub mod users;
