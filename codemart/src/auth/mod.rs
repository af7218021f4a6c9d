//! Authentication and authorization.
//!
//! # Authentication
//!
//! Browser sessions only:
//! - Users log in via `/authentication/login` with username and password
//! - The session reference is stored in a secure, HTTP-only cookie
//! - Session records live server-side in the [`SessionStore`](crate::db::handlers::SessionStore)
//!   and expire after `auth.native.session.timeout`
//!
//! # Authorization
//!
//! Two gates, both extractors in [`current_user`]:
//! - `CurrentUser`: any live session
//! - `AdminUser`: a live session whose identity has the administrator flag
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use codemart::api::models::users::CurrentUser;
//! use codemart::auth::current_user::AdminUser;
//!
//! async fn profile(user: CurrentUser) -> String {
//!     format!("Hello, {}!", user.username)
//! }
//!
//! async fn back_office(AdminUser(admin): AdminUser) -> String {
//!     format!("Administrator {}", admin.username)
//! }
//! ```
//!
//! # Modules
//!
//! - [`current_user`]: the `requireAuth` / `requireAdmin` extractors
//! - [`password`]: Argon2id verifiers with constant-time comparison
//! - [`session`]: session creation, lookup and cookies
//! - [`tokens`]: random email verification tokens
//! - [`utils`]: input normalisation and verification links

pub mod current_user;
pub mod password;
pub mod session;
pub mod tokens;
pub mod utils;
