use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use imcore_types::Application;
use serde::Deserialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::api::dto::{ApplicationDto, CreateApplicationRequest};
use crate::error::ApiResult;
use crate::middleware::build_context;
use crate::state::AppState;

/// Admin-only application registry endpoints (spec.md §6's
/// `SearchApps`/`CreateApp`, auth "admin"). Grounded on
/// `runelink-server/src/api/mod.rs`'s flat `/resource` route style;
/// the admin auth check is `from-service`/`from-service-id` ("[Service]
/// authorization" per `original_source/internal/model/headers.go`).
pub fn router() -> Router<AppState> {
    Router::new().route("/apps", get(search).post(create))
}

#[derive(Deserialize)]
struct SearchParams {
    client_id: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<ApplicationDto>>> {
    build_context(&headers, Some(peer)).require_service_auth()?;
    let apps = state.app_resolver.search(params.client_id.as_deref()).await?;
    Ok(Json(apps.iter().map(ApplicationDto::from).collect()))
}

async fn create(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<CreateApplicationRequest>,
) -> ApiResult<Json<ApplicationDto>> {
    build_context(&headers, Some(peer)).require_service_auth()?;
    let app = Application {
        dc: req.dc,
        id: Uuid::new_v4(),
        client_id: req.client_id,
        name: req.name,
        about: req.about,
        constraints: req.constraints.unwrap_or_default(),
        created_at: OffsetDateTime::now_utc(),
    };
    let created = state.app_resolver.create(app).await?;
    Ok(Json(ApplicationDto::from(&created)))
}
