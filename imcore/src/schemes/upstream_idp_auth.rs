use std::sync::Arc;

use imcore_types::{Contact, ContactKey, ContactName};

use crate::contact_client::ContactClient;
use crate::context::RequestContext;
use crate::device_resolver::DeviceResolver;
use crate::error::CoreError;
use crate::idp_inspector::IdpInspector;
use crate::pipeline::{Acr, AuthOutcome, Scheme};
use crate::session::{SessionManager, SessionStore};

/// Issuer/contact-type literals used for contacts minted from the upstream
/// IdP. spec.md §4.2.3 states `iss = "webitel"`; the original source uses
/// `"im.webitel.org"` for the same field — spec.md is authoritative here
/// (see DESIGN.md, Open Question 5).
const ISSUER_ID: &str = "webitel";
const CONTACT_TYPE: &str = "webitel";

/// Calls the external identity provider's introspection endpoint, subject
/// to `IdpInspector`'s TTL cache. Does not mint a new grant: if no
/// existing session is found for `(device_id, contact_id)`, an in-memory
/// `Session` is returned so downstream can observe identity, but it is
/// never persisted. Grounded on
/// `original_source/internal/handler/auth_webitel.go`.
pub struct UpstreamIdpAuthScheme<S: SessionStore> {
    pub inspector: Arc<IdpInspector>,
    pub session_manager: Arc<SessionManager<S>>,
    pub contact_client: Arc<dyn ContactClient>,
}

#[async_trait::async_trait]
impl<S: SessionStore> Scheme for UpstreamIdpAuthScheme<S> {
    fn name(&self) -> &'static str {
        "UpstreamIdpAuth"
    }

    async fn authenticate(&self, ctx: &mut RequestContext) -> AuthOutcome {
        let bearer = ctx.access_token_header().to_string();
        if bearer.is_empty() {
            return AuthOutcome::NotRecognized;
        }

        let record = match self.inspector.inspect(&bearer).await {
            Ok(record) => record,
            Err(err) if err.kind == crate::error::CoreErrorKind::Unauthenticated => {
                return AuthOutcome::Rejected(err)
            }
            Err(err) => return AuthOutcome::Transient(err),
        };

        if !record.is_valid_at(ctx.date) {
            return AuthOutcome::Rejected(CoreError::unauthenticated("messaging: token expired"));
        }

        let sub = record.user_id.to_string();
        let contact = Contact {
            id: uuid::Uuid::new_v4(),
            dc: record.dc,
            iss: ISSUER_ID.to_string(),
            sub: sub.clone(),
            app: String::new(),
            r#type: CONTACT_TYPE.to_string(),
            name: ContactName {
                common_name: if record.name.is_empty() {
                    record.username.clone()
                } else {
                    record.name.clone()
                },
                ..Default::default()
            },
            username: Some(record.username.clone()),
            birthdate: None,
            zoneinfo: None,
            profile: None,
            picture: None,
            gender: None,
            locale: None,
            email: None,
            email_verified: false,
            phone: None,
            phone_verified: false,
            metadata: Default::default(),
        };

        let upserted = match self.contact_client.upsert(contact).await {
            Ok(contact) => contact,
            Err(err) => return AuthOutcome::Transient(err),
        };
        let contact_key = ContactKey::by_subject(upserted.dc, &upserted.iss, &upserted.sub);

        let device = ctx.device.clone().unwrap_or_else(|| DeviceResolver::resolve(ctx));
        ctx.device = Some(device.clone());
        match self
            .session_manager
            .find(record.dc, &device.id, &contact_key)
            .await
        {
            Ok(Some(session)) => {
                ctx.session = Some(session);
            }
            Ok(None) => {
                let in_memory = imcore_types::Session::new_in_memory(
                    record.dc,
                    String::new(),
                    device,
                    contact_key.clone(),
                );
                ctx.session = Some(in_memory);
            }
            Err(err) => return AuthOutcome::Transient(err),
        }

        ctx.contact = Some(upserted);
        AuthOutcome::Accepted(Acr::UpstreamIdp {
            contact: contact_key,
            bearer,
        })
    }
}
