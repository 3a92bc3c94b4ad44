use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};

use imcore::device_resolver::DeviceResolver;
use imcore::session::{ListSessionsFilter, TokenPolicy};
use imcore_types::Session;

use crate::api::dto::{AuthorizationDto, ListAuthorizationsQuery, TokenRequest};
use crate::error::{ApiError, ApiResult};
use crate::middleware::build_context;
use crate::state::AppState;

/// Auth/session endpoints. Grounded on `runelink-server/src/api/auth.rs`'s
/// router-building shape (`Router::new().route(...).nest(...)`) but
/// mapping spec.md §6's RPC surface rather than OIDC discovery/token
/// issuance.
pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/auth",
        Router::new()
            .route("/token", post(token))
            .route("/logout", post(logout))
            .route("/inspect", get(inspect))
            .route("/device/push", post(register_device).delete(unregister_device))
            .route("/sessions", get(get_authorizations)),
    )
}

async fn token(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<AuthorizationDto>> {
    let mut ctx = build_context(&headers, Some(peer));

    match req.grant_type.as_str() {
        "identity" => {}
        other => {
            return Err(ApiError::from(imcore::CoreError::bad_request(format!(
                "auth: unknown grant type {other:?}"
            ))));
        }
    }

    let client_id = ctx.client_id_header().to_string();
    let app = state.app_resolver.require(&client_id).await?;
    ctx.dc = app.dc;
    ctx.app = Some(app.clone());

    let device = DeviceResolver::resolve(&ctx);
    DeviceResolver::require_device_id(&device)?;
    DeviceResolver::authorize(&ctx, &app, &device)?;
    ctx.device = Some(device.clone());

    let acr = state.pipeline.require_authenticated(&mut ctx).await?;
    let contact = acr.contact().clone();

    let policy = TokenPolicy {
        length: state.config.default_token_length,
        ..TokenPolicy::default()
    };

    let session = state
        .session_manager
        .authenticate(app.dc, &client_id, device, contact, policy)
        .await?;

    Ok(Json(AuthorizationDto::from_session(&session, true)))
}

async fn logout(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let mut ctx = build_context(&headers, Some(peer));
    state.pipeline.require_authenticated(&mut ctx).await?;
    let session = ctx
        .session
        .ok_or_else(|| imcore::CoreError::unauthenticated("messaging: no active session"))?;
    state.session_manager.logout(session.id).await?;
    Ok(Json(serde_json::json!({})))
}

async fn inspect(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> ApiResult<Json<AuthorizationDto>> {
    let mut ctx = build_context(&headers, Some(peer));
    state.pipeline.require_authenticated(&mut ctx).await?;
    let session = ctx
        .session
        .ok_or_else(|| imcore::CoreError::unauthenticated("messaging: no active session"))?;
    Ok(Json(AuthorizationDto::from_session(&session, true)))
}

/// Upstream-IdP authentications may hand back an in-memory, unpersisted
/// session (Open Question 1): before attaching a push subscription the
/// session must actually exist as a row, so it is materialized here via
/// the same `(device, contact)` uniqueness rule `Authenticate` uses.
async fn materialize_session(state: &AppState, ctx: &imcore::context::RequestContext, session: Session) -> ApiResult<Session> {
    if session.is_persisted() {
        return Ok(session);
    }
    let device = ctx.device.clone().unwrap_or(session.device.clone());
    let materialized = state
        .session_manager
        .authenticate(
            session.dc,
            &session.app_id,
            device,
            session.contact.clone(),
            TokenPolicy {
                length: state.config.default_token_length,
                ..TokenPolicy::default()
            },
        )
        .await?;
    Ok(materialized)
}

async fn register_device(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(subscription): Json<imcore_types::PushSubscription>,
) -> ApiResult<Json<AuthorizationDto>> {
    let mut ctx = build_context(&headers, Some(peer));
    state.pipeline.require_authenticated(&mut ctx).await?;
    let session = ctx
        .session
        .take()
        .ok_or_else(|| imcore::CoreError::unauthenticated("messaging: no active session"))?;
    let app = state.app_resolver.require(&session.app_id).await?;
    if !app.constraints.allows_push(subscription.provider()) {
        return Err(ApiError::from(imcore::CoreError::bad_request(
            "messaging: push provider not permitted",
        )));
    }
    let session = materialize_session(&state, &ctx, session).await?;
    let updated = state
        .session_manager
        .register_push(session.id, session.device.clone(), subscription)
        .await?;
    Ok(Json(AuthorizationDto::from_session(&updated, true)))
}

async fn unregister_device(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(subscription): Json<imcore_types::PushSubscription>,
) -> ApiResult<Json<AuthorizationDto>> {
    let mut ctx = build_context(&headers, Some(peer));
    state.pipeline.require_authenticated(&mut ctx).await?;
    let session = ctx
        .session
        .ok_or_else(|| imcore::CoreError::unauthenticated("messaging: no active session"))?;
    let updated = state
        .session_manager
        .unregister_push(&session, &subscription)
        .await?;
    Ok(Json(AuthorizationDto::from_session(&updated, true)))
}

async fn get_authorizations(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<ListAuthorizationsQuery>,
) -> ApiResult<Json<Vec<AuthorizationDto>>> {
    let mut ctx = build_context(&headers, Some(peer));
    // Per spec.md §6, `GetAuthorizations` accepts an *optional* principal:
    // an unauthenticated caller may still list by explicit filters.
    let _ = state.pipeline.authenticate(&mut ctx).await?;
    let current_id = ctx.session.as_ref().map(|s| s.id);

    let contact = query
        .contact
        .as_deref()
        .map(|raw| raw.parse())
        .transpose()
        .map_err(|e: imcore_types::ParseContactKeyError| imcore::CoreError::bad_request(e.to_string()))?;

    let filter = ListSessionsFilter {
        dc: query.dc,
        id: query.id,
        app_id: query.app_id,
        device_id: query.device_id,
        contact,
        token: None,
        push_only: query.push.unwrap_or(false),
        page: query.page,
        size: query.size,
    };
    let sessions = state.session_manager.list(filter).await?;
    let dtos = sessions
        .iter()
        .map(|s| AuthorizationDto::from_session(s, current_id == Some(s.id)))
        .collect();
    Ok(Json(dtos))
}
