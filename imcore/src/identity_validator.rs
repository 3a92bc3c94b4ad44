use imcore_types::{Application, ContactName};

use crate::error::CoreError;

/// Namespaces an issuer may never claim — they are reserved for the
/// platform's own protocol/service/bot identities.
pub const RESERVED_ISSUER_NAMESPACES: &[&str] = &[
    "app",
    "service",
    "bot",
    "script",
    "scheme",
    "user",
    "webitel",
    "contact",
    "viber",
    "signal",
    "telegram",
    "whatsapp",
    "facebook",
    "instagram",
];

/// An inbound identity assertion before it has been cross-checked against
/// an Application's constraints (see §4.5).
#[derive(Clone, Debug, Default)]
pub struct IdentityAssertion {
    pub dc: i64,
    pub iss: String,
    pub sub: String,
    pub app: String,
    pub name: ContactName,
}

/// Applies Application-level constraints to an inbound identity assertion,
/// in the six steps spec.md §4.5 lists in order.
pub struct IdentityValidator;

impl IdentityValidator {
    pub fn validate(app: &Application, mut assertion: IdentityAssertion) -> Result<IdentityAssertion, CoreError> {
        // 1. sub non-empty.
        if assertion.sub.trim().is_empty() {
            return Err(CoreError::no_subject("identity: missing subject"));
        }

        // 2. iss allow-listed and not a reserved namespace.
        if !app.constraints.allows_issuer(&assertion.iss) {
            return Err(CoreError::bad_issuer(format!(
                "identity: issuer {:?} not permitted for this application",
                assertion.iss
            )));
        }
        if RESERVED_ISSUER_NAMESPACES.contains(&assertion.iss.to_lowercase().as_str()) {
            return Err(CoreError::bad_issuer(format!(
                "identity: issuer {:?} is a reserved namespace",
                assertion.iss
            )));
        }

        // 3. contact type resolved by the caller via app.contact_type_for(iss).

        // 4. tenant binding.
        if assertion.dc == 0 {
            assertion.dc = app.dc;
        } else if assertion.dc != app.dc {
            return Err(CoreError::bad_request("identity: invalid business identifier"));
        }

        // 5. name validity, with common-name synthesis from parts.
        if !assertion.name.is_valid() {
            return Err(CoreError::bad_request("identity: missing displayable name"));
        }
        if assertion.name.common_name.trim().is_empty() {
            assertion.name.common_name = assertion.name.synthesize_common_name();
        }

        // 6. app defaults to the caller's client-id.
        if assertion.app.is_empty() {
            assertion.app = app.client_id.clone();
        }

        Ok(assertion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imcore_types::ClientConstraints;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn app(dc: i64, issuers: Vec<&str>) -> Application {
        Application {
            dc,
            id: Uuid::new_v4(),
            client_id: "A1".into(),
            name: "App".into(),
            about: None,
            constraints: ClientConstraints {
                issuers: issuers.into_iter().map(str::to_string).collect(),
                ..Default::default()
            },
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn rejects_empty_subject() {
        let app = app(7, vec!["idp.example"]);
        let assertion = IdentityAssertion {
            dc: 7,
            iss: "idp.example".into(),
            sub: "".into(),
            ..Default::default()
        };
        let err = IdentityValidator::validate(&app, assertion).unwrap_err();
        assert_eq!(err.kind, crate::error::CoreErrorKind::NoSubject);
    }

    #[test]
    fn rejects_reserved_namespace_issuer() {
        let app = app(7, vec![]);
        let assertion = IdentityAssertion {
            dc: 7,
            iss: "Webitel".into(),
            sub: "42".into(),
            name: ContactName {
                common_name: "Ada".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = IdentityValidator::validate(&app, assertion).unwrap_err();
        assert_eq!(err.kind, crate::error::CoreErrorKind::BadIssuer);
    }

    #[test]
    fn assigns_tenant_when_zero_and_rejects_mismatch() {
        let app = app(7, vec!["idp.example"]);
        let ok = IdentityValidator::validate(
            &app,
            IdentityAssertion {
                dc: 0,
                iss: "idp.example".into(),
                sub: "42".into(),
                name: ContactName {
                    common_name: "Ada".into(),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ok.dc, 7);
        assert_eq!(ok.app, "A1");

        let mismatched = IdentityAssertion {
            dc: 9,
            iss: "idp.example".into(),
            sub: "42".into(),
            name: ContactName {
                common_name: "Ada".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = IdentityValidator::validate(&app, mismatched).unwrap_err();
        assert_eq!(err.kind, crate::error::CoreErrorKind::BadRequest);
    }

    #[test]
    fn synthesizes_common_name_from_parts() {
        let app = app(7, vec!["idp.example"]);
        let assertion = IdentityAssertion {
            dc: 7,
            iss: "idp.example".into(),
            sub: "42".into(),
            name: ContactName {
                given_name: "Ada".into(),
                family_name: "Lovelace".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        let ok = IdentityValidator::validate(&app, assertion).unwrap();
        assert_eq!(ok.name.common_name, "Ada Lovelace");
    }
}
