use imcore_types::Application;

use crate::error::CoreError;

/// The identity fields a verified JWT must expose, irrespective of which
/// concrete claim set the issuer used.
#[derive(Clone, Debug, Default)]
pub struct IdentityClaims {
    pub dc: i64,
    pub iss: String,
    pub sub: String,
    pub app: String,
    pub name: String,
    pub given_name: String,
    pub middle_name: String,
    pub family_name: String,
}

/// Declared extension point for JWT signature verification (spec.md §9):
/// this revision does not verify cryptographic signatures. A complete core
/// MUST verify via a JWKS fetched from the Application's configured URL,
/// cached with a freshness bound — see `JwksVerifier` below for the shape
/// that implementation would take.
#[async_trait::async_trait]
pub trait JwtVerifier {
    async fn decode(&self, bearer: &str, app: &Application) -> Result<IdentityClaims, CoreError>;
}

/// Stub implementation: decodes the JWT payload without checking the
/// signature. Exists so the pipeline is runnable end-to-end today; callers
/// MUST swap in a real `JwtVerifier` before trusting this path in
/// production (see `JwksVerifier`'s doc comment).
pub struct UnverifiedJwtDecoder;

#[async_trait::async_trait]
impl JwtVerifier for UnverifiedJwtDecoder {
    async fn decode(&self, bearer: &str, _app: &Application) -> Result<IdentityClaims, CoreError> {
        let mut parts = bearer.split('.');
        let _header = parts.next();
        let payload = parts
            .next()
            .ok_or_else(|| CoreError::unauthorized_client("messaging: malformed JWT"))?;

        let decoded = base64::Engine::decode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, payload)
            .map_err(|_| CoreError::unauthorized_client("messaging: malformed JWT payload"))?;
        let value: serde_json::Value = serde_json::from_slice(&decoded)
            .map_err(|_| CoreError::unauthorized_client("messaging: malformed JWT payload"))?;

        let as_str = |key: &str| value.get(key).and_then(|v| v.as_str()).unwrap_or("").to_string();
        let dc = value.get("dc").and_then(|v| v.as_i64()).unwrap_or(0);

        Ok(IdentityClaims {
            dc,
            iss: as_str("iss"),
            sub: as_str("sub"),
            app: as_str("app"),
            name: as_str("name"),
            given_name: as_str("given_name"),
            middle_name: as_str("middle_name"),
            family_name: as_str("family_name"),
        })
    }
}

/// Shape of the production verifier: fetches the Application's JWKS URL,
/// caches the key set with a freshness bound, and validates signature +
/// `exp`/`nbf`/`aud` via `jsonwebtoken`. Not wired to any pipeline scheme
/// in this revision — left here as the declared extension point spec.md
/// §9 calls for.
pub struct JwksVerifier {
    pub http: reqwest::Client,
}

impl JwksVerifier {
    pub fn new(http: reqwest::Client) -> Self {
        JwksVerifier { http }
    }
}

#[async_trait::async_trait]
impl JwtVerifier for JwksVerifier {
    async fn decode(&self, _bearer: &str, app: &Application) -> Result<IdentityClaims, CoreError> {
        Err(CoreError::internal(format!(
            "messaging: JWKS verification not implemented for application {}",
            app.client_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn app() -> Application {
        Application {
            dc: 7,
            id: Uuid::new_v4(),
            client_id: "A1".into(),
            name: "App".into(),
            about: None,
            constraints: Default::default(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn decodes_unverified_payload() {
        let payload = serde_json::json!({
            "iss": "idp.example",
            "sub": "42",
            "name": "Ada Lovelace",
            "dc": 7,
        });
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(serde_json::to_vec(&payload).unwrap());
        let jwt = format!("header.{encoded}.signature");
        let claims = UnverifiedJwtDecoder.decode(&jwt, &app()).await.unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.dc, 7);
    }
}
