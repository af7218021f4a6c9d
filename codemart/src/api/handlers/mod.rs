//! HTTP request handlers for all API endpoints.
//!
//! Each handler validates its input through typed extractors, checks authentication and
//! authorization through the gates in [`crate::auth::current_user`], calls the stores on
//! [`crate::AppState`] and serialises the result.
//!
//! # Handler Modules
//!
//! - [`auth`]: registration, login, logout, email verification and password changes
//! - [`users`]: the signed-in user's own profile
//! - [`admin`]: user listing for administrators
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`], which converts to the matching HTTP status code and
//! a user-safe message.

pub mod admin;
pub mod auth;
pub mod users;
