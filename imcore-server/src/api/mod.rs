use axum::Router;

use crate::state::AppState;

pub mod apps;
pub mod auth;
pub mod dto;

/// Composes all route groups, mirroring `runelink-server/src/api/mod.rs`'s
/// `Router::new().merge(...)` pattern.
pub fn router() -> Router<AppState> {
    Router::new().merge(auth::router()).merge(apps::router())
}
