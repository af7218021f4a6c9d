//! Database record models matching table schemas.
//!
//! These structs correspond directly to table rows and derive `sqlx::FromRow` for query results.
//! They are kept separate from the API models in [`crate::api::models`] so that storage-only
//! columns (the password verifier, the verification token) never reach a response body by
//! accident.
//!
//! - [`users`]: identities, profile data and email verification state
//! - [`sessions`]: server-side login sessions

pub mod sessions;
pub mod users;
