//! Storage traits and their PostgreSQL implementations.
//!
//! - [`IdentityStore`] / [`Users`]: identity records and the email verification lifecycle
//! - [`SessionStore`] / [`Sessions`]: server-side login sessions
//!
//! The PostgreSQL stores hold a [`sqlx::PgPool`] and issue one statement per operation; no
//! operation here needs more than a single-row atomic write.

pub mod repository;
pub mod sessions;
pub mod users;

pub use repository::{IdentityStore, SessionStore};
pub use sessions::Sessions;
pub use users::Users;
