use std::sync::Arc;

use imcore_types::ContactKey;

use crate::context::RequestContext;
use crate::contact_client::ContactClient;
use crate::error::CoreError;
use crate::pipeline::{Acr, AuthOutcome, Scheme};
use crate::session::{SessionManager, SessionStore};
use crate::token_codec;

/// Recognises a bearer value prefixed with `im:`. Looks the remainder up
/// by exact token match, verifies the grant, cross-checks app/device, and
/// resolves the session's contact. Grounded on
/// `original_source/internal/handler/auth_session.go`.
pub struct SessionAuthScheme<S: SessionStore> {
    pub session_manager: Arc<SessionManager<S>>,
    pub contact_client: Arc<dyn ContactClient>,
}

#[async_trait::async_trait]
impl<S: SessionStore> Scheme for SessionAuthScheme<S> {
    fn name(&self) -> &'static str {
        "SessionAuth"
    }

    async fn authenticate(&self, ctx: &mut RequestContext) -> AuthOutcome {
        let bearer = ctx.access_token_header().to_string();
        if bearer.is_empty() {
            return AuthOutcome::NotRecognized;
        }
        let Some(opaque) = token_codec::strip_session_prefix(&bearer) else {
            return AuthOutcome::NotRecognized;
        };

        let session = match self.session_manager.find_by_token(opaque).await {
            Ok(Some(session)) => session,
            Ok(None) => {
                return AuthOutcome::Rejected(CoreError::unauthenticated("messaging: token invalid"));
            }
            Err(err) => return AuthOutcome::Transient(err),
        };

        let grant = match &session.grant {
            Some(grant) => grant,
            None => return AuthOutcome::Rejected(CoreError::unauthenticated("messaging: token invalid")),
        };
        if let Err(verify_err) = grant.verify(ctx.date) {
            let message = match verify_err {
                imcore_types::TokenVerifyError::Expired => "messaging: token expired",
                _ => "messaging: token invalid",
            };
            return AuthOutcome::Rejected(CoreError::unauthenticated(message));
        }

        let client_id = ctx.client_id_header();
        if !client_id.is_empty() && client_id != session.app_id {
            return AuthOutcome::Rejected(CoreError::unauthorized_client("messaging: client not authorized"));
        }
        let device_id = ctx.device_id_header();
        if !device_id.is_empty() && device_id != session.device.id {
            return AuthOutcome::Rejected(CoreError::unauthorized_client("messaging: device not authorized"));
        }

        let contact_key: ContactKey = session.contact.clone();

        let contact = match self.contact_client.find(&contact_key).await {
            Ok(Some(contact)) => contact,
            Ok(None) => {
                return AuthOutcome::Rejected(CoreError::unauthenticated(format!(
                    "messaging: contact({}@{}); not found",
                    contact_key.sub, contact_key.iss
                )));
            }
            Err(err) => return AuthOutcome::Transient(err),
        };

        ctx.device = Some(session.device.clone());
        ctx.contact = Some(contact);
        ctx.session = Some(session);
        AuthOutcome::Accepted(Acr::Session { contact: contact_key })
    }
}
