use std::sync::Arc;

use imcore_types::ContactName;

use crate::app_resolver::{AppResolver, AppStore};
use crate::contact_client::ContactClient;
use crate::context::RequestContext;
use crate::error::CoreError;
use crate::identity_validator::{IdentityAssertion, IdentityValidator};
use crate::jwt_verifier::JwtVerifier;
use crate::pipeline::{Acr, AuthOutcome, Scheme};

/// Recognises a bearer value that parses as JWS-compact (three base64url
/// segments). Signature verification and claim mapping are delegated to
/// the `JwtVerifier` extension point — see spec.md §9.
pub struct JwtAuthScheme<V: JwtVerifier, S: AppStore> {
    pub verifier: V,
    pub app_resolver: Arc<AppResolver<S>>,
    pub contact_client: Arc<dyn ContactClient>,
}

fn looks_like_jws_compact(bearer: &str) -> bool {
    bearer.splitn(4, '.').count() == 3 && !bearer.contains(' ')
}

#[async_trait::async_trait]
impl<V: JwtVerifier + Send + Sync, S: AppStore> Scheme for JwtAuthScheme<V, S> {
    fn name(&self) -> &'static str {
        "JwtAuth"
    }

    async fn authenticate(&self, ctx: &mut RequestContext) -> AuthOutcome {
        let bearer = ctx.access_token_header().to_string();
        if !looks_like_jws_compact(&bearer) {
            return AuthOutcome::NotRecognized;
        }

        let client_id = ctx.client_id_header().to_string();
        let app = match self.app_resolver.require(&client_id).await {
            Ok(app) => app,
            Err(err) => return AuthOutcome::Rejected(err),
        };

        let claims = match self.verifier.decode(&bearer, &app).await {
            Ok(claims) => claims,
            Err(_) => {
                return AuthOutcome::Rejected(CoreError::unauthorized_client(
                    "messaging: invalid JWT identity",
                ))
            }
        };

        let assertion = IdentityAssertion {
            dc: claims.dc,
            iss: claims.iss,
            sub: claims.sub,
            app: claims.app,
            name: ContactName {
                common_name: claims.name,
                given_name: claims.given_name,
                middle_name: claims.middle_name,
                family_name: claims.family_name,
            },
        };
        let assertion = match IdentityValidator::validate(&app, assertion) {
            Ok(assertion) => assertion,
            Err(err) => return AuthOutcome::Rejected(err),
        };

        let contact_type = app.contact_type_for(&assertion.iss);
        let contact = imcore_types::Contact {
            id: uuid::Uuid::new_v4(),
            dc: assertion.dc,
            iss: assertion.iss.clone(),
            sub: assertion.sub.clone(),
            app: assertion.app.clone(),
            r#type: contact_type,
            name: ContactName {
                common_name: assertion.name.common_name.clone(),
                given_name: assertion.name.given_name.clone(),
                middle_name: assertion.name.middle_name.clone(),
                family_name: assertion.name.family_name.clone(),
            },
            username: None,
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

        let contact_key = imcore_types::ContactKey::by_subject(upserted.dc, &upserted.iss, &upserted.sub);
        ctx.contact = Some(upserted);
        AuthOutcome::Accepted(Acr::Jwt { contact: contact_key })
    }
}

#[cfg(test)]
mod tests {
    use super::looks_like_jws_compact;

    #[test]
    fn recognises_jws_compact_shape() {
        assert!(looks_like_jws_compact("aaa.bbb.ccc"));
        assert!(!looks_like_jws_compact("im:opaque"));
        assert!(!looks_like_jws_compact("a.b.c.d"));
    }
}
