//! HTTP surface: chat, admin REST endpoints, health and static pages.

pub mod routes;

pub use routes::{AppState, app_router};
