use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::device::Device;
use crate::ids::ContactKey;
use crate::push::PushSubscription;

/// Outcome of `AccessToken::verify`, mirroring the three-way classification
/// the original token model makes instead of a single boolean.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenVerifyError {
    #[error("token invalid")]
    Invalid,
    #[error("token not yet active")]
    NotActive,
    #[error("token expired")]
    Expired,
}

/// Token material attached to a session.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AccessToken {
    /// equal to the owning session id.
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub token: String,
    pub refresh: Option<String>,
    pub scope: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub revoked_at: Option<OffsetDateTime>,
}

impl AccessToken {
    pub fn bearer(id: Uuid, token: impl Into<String>, issued_at: OffsetDateTime) -> Self {
        AccessToken {
            id,
            kind: "bearer".to_string(),
            token: token.into(),
            refresh: None,
            scope: Vec::new(),
            issued_at,
            expires_at: None,
            revoked_at: None,
        }
    }

    /// `token != "" AND (revoked_at == None OR now <= revoked_at)
    ///   AND (expires_at == None OR now < expires_at) AND issued_at <= now`.
    pub fn verify(&self, now: OffsetDateTime) -> Result<(), TokenVerifyError> {
        if self.token.is_empty() {
            return Err(TokenVerifyError::Invalid);
        }
        if let Some(revoked_at) = self.revoked_at {
            if now > revoked_at {
                return Err(TokenVerifyError::Invalid);
            }
        }
        if let Some(expires_at) = self.expires_at {
            if expires_at < now {
                return Err(TokenVerifyError::Expired);
            }
        }
        if self.issued_at > now {
            return Err(TokenVerifyError::NotActive);
        }
        Ok(())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("token", &"[REDACTED]")
            .field("refresh", &self.refresh.as_ref().map(|_| "[REDACTED]"))
            .field("scope", &self.scope)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("revoked_at", &self.revoked_at)
            .finish()
    }
}

/// The central record binding `(app, device, contact)` to a grant.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub dc: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// human-friendly device label derived from user-agent.
    pub name: String,
    pub app_id: String,
    pub device: Device,
    pub contact: ContactKey,
    pub metadata: HashMap<String, String>,
    pub grant: Option<AccessToken>,
}

impl Session {
    pub fn new_in_memory(dc: i64, app_id: impl Into<String>, device: Device, contact: ContactKey) -> Self {
        Session {
            id: Uuid::nil(),
            dc,
            created_at: OffsetDateTime::now_utc(),
            name: device.session_name(),
            app_id: app_id.into(),
            device,
            contact,
            metadata: HashMap::new(),
            grant: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        !self.id.is_nil()
    }

    pub fn push(&self) -> Option<&PushSubscription> {
        self.device.push.as_ref()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("dc", &self.dc)
            .field("name", &self.name)
            .field("app_id", &self.app_id)
            .field("device_id", &self.device.id)
            .field("contact", &self.contact)
            .field("grant", &self.grant)
            .finish()
    }
}

/// Type alias used by §3's text interchangeably with `Session`.
pub type Authorization = Session;

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn token_at(now: OffsetDateTime) -> AccessToken {
        AccessToken::bearer(Uuid::new_v4(), "secret", now)
    }

    #[test]
    fn verify_ok_within_validity_window() {
        let now = OffsetDateTime::now_utc();
        let grant = token_at(now);
        assert!(grant.verify(now).is_ok());
        assert!(grant.verify(now + Duration::minutes(5)).is_ok());
    }

    #[test]
    fn verify_expired_after_expires_at() {
        let now = OffsetDateTime::now_utc();
        let mut grant = token_at(now);
        grant.expires_at = Some(now + Duration::seconds(1));
        assert_eq!(
            grant.verify(now + Duration::seconds(2)),
            Err(TokenVerifyError::Expired)
        );
    }

    #[test]
    fn verify_invalid_once_revoked() {
        let now = OffsetDateTime::now_utc();
        let mut grant = token_at(now);
        grant.revoked_at = Some(now);
        assert_eq!(
            grant.verify(now + Duration::seconds(1)),
            Err(TokenVerifyError::Invalid)
        );
    }

    #[test]
    fn verify_invalid_for_empty_token() {
        let now = OffsetDateTime::now_utc();
        let mut grant = token_at(now);
        grant.token = String::new();
        assert_eq!(grant.verify(now), Err(TokenVerifyError::Invalid));
    }
}
