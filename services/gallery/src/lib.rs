//! Token-gated media gallery
//!
//! Media items are grouped into projects and tagged with a category. Items in
//! the `secret` category can only be read with their current access token,
//! which admins issue, rotate and revoke and hand out as shareable links.

pub mod access;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod share;
pub mod state;
pub mod validation;
pub mod viewer;

pub use state::AppState;
