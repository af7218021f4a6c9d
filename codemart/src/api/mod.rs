//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//! - **[`validation`]**: the validated JSON body extractor
//!
//! # API Structure
//!
//! - **Authentication** (`/authentication/*`): registration, login, sessions, email verification
//! - **Users** (`/api/v1/users/current`): the signed-in user's profile
//! - **Admin** (`/api/v1/admin/users/*`): administrator-only user management
//!
//! All endpoints are documented with `utoipa`; the rendered reference is served at `/docs`.

pub mod handlers;
pub mod models;
pub mod validation;
