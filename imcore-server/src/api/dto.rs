use std::collections::HashMap;

use imcore_types::{Application, ClientConstraints, PushSubscription, Session};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Wire form of a `Session`/`Authorization`, replacing the opaque grant
/// secret with its `im:`-prefixed wire token and adding the `current` flag
/// spec.md §6's `GetAuthorizations` response requires.
#[derive(Serialize)]
pub struct AuthorizationDto {
    pub id: Uuid,
    pub dc: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub name: String,
    pub app_id: String,
    pub device_id: String,
    pub contact: String,
    pub metadata: HashMap<String, String>,
    pub token: Option<String>,
    pub expires_at: Option<String>,
    pub push: Option<PushSubscription>,
    pub current: bool,
}

impl AuthorizationDto {
    pub fn from_session(session: &Session, current: bool) -> Self {
        AuthorizationDto {
            id: session.id,
            dc: session.dc,
            created_at: session.created_at,
            name: session.name.clone(),
            app_id: session.app_id.clone(),
            device_id: session.device.id.clone(),
            contact: session.contact.to_string(),
            metadata: session.metadata.clone(),
            token: session
                .grant
                .as_ref()
                .map(|g| imcore::token_codec::format_session_token(&g.token)),
            expires_at: session
                .grant
                .as_ref()
                .and_then(|g| g.expires_at)
                .map(|t| t.to_string()),
            push: session.push().cloned(),
            current,
        }
    }
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    #[allow(dead_code)]
    pub scope: Option<Vec<String>>,
    #[allow(dead_code)]
    pub state: Option<String>,
}

#[derive(Deserialize)]
pub struct ListAuthorizationsQuery {
    pub dc: Option<i64>,
    pub id: Option<Uuid>,
    pub app_id: Option<String>,
    pub device_id: Option<String>,
    pub contact: Option<String>,
    pub push: Option<bool>,
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    20
}

#[derive(Serialize)]
pub struct ApplicationDto {
    pub dc: i64,
    pub id: Uuid,
    pub client_id: String,
    pub name: String,
    pub about: Option<String>,
}

impl From<&Application> for ApplicationDto {
    fn from(app: &Application) -> Self {
        ApplicationDto {
            dc: app.dc,
            id: app.id,
            client_id: app.client_id.clone(),
            name: app.name.clone(),
            about: app.about.clone(),
        }
    }
}

#[derive(Deserialize)]
pub struct CreateApplicationRequest {
    pub dc: i64,
    pub client_id: String,
    pub name: String,
    pub about: Option<String>,
    pub constraints: Option<ClientConstraints>,
}
