use std::sync::Arc;

use imcore_types::{AccessToken, ContactKey, Device, PushSubscription, Session};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::CoreError;
use crate::session::store::{ListSessionsFilter, SessionStore};
use crate::token_codec;

/// Policy governing a single `MintGrant` call: opaque-token length and
/// optional TTL/refresh-token generation. Refresh-token rotation itself is
/// left unimplemented per spec.md §9 ("declared structurally but not
/// implemented") — only the field is populated when `with_refresh` is set.
#[derive(Clone, Copy, Debug)]
pub struct TokenPolicy {
    pub length: usize,
    pub ttl: Option<time::Duration>,
    pub with_refresh: bool,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        TokenPolicy {
            length: 64,
            ttl: None,
            with_refresh: false,
        }
    }
}

pub struct SessionManager<S: SessionStore> {
    store: Arc<S>,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        SessionManager { store }
    }

    /// Returns the unique session for `(dc, device, contact)`, if any.
    pub async fn find(&self, dc: i64, device_id: &str, contact: &ContactKey) -> Result<Option<Session>, CoreError> {
        self.store
            .find_one(ListSessionsFilter::by_device_contact(
                dc,
                device_id,
                contact.clone(),
            ))
            .await
    }

    pub async fn find_by_token(&self, token: &str) -> Result<Option<Session>, CoreError> {
        self.store.find_one(ListSessionsFilter::by_token(token)).await
    }

    /// Backs `GetAuthorizations`: paged listing with the filters spec.md
    /// §6 names, ordered by the store per `created_at DESC, id ASC`.
    pub async fn list(&self, filter: ListSessionsFilter) -> Result<Vec<Session>, CoreError> {
        self.store.list(filter).await
    }

    /// Generates a new opaque bearer grant and atomically replaces any
    /// previous grant on the session — the previous token is invalid the
    /// moment the replacement commits.
    pub async fn mint_grant(
        &self,
        session_id: Uuid,
        not_before: OffsetDateTime,
        policy: TokenPolicy,
    ) -> Result<Session, CoreError> {
        let opaque = token_codec::generate(policy.length);
        let refresh = policy.with_refresh.then(|| token_codec::generate(policy.length));
        let mut grant = AccessToken::bearer(session_id, opaque, not_before);
        grant.refresh = refresh;
        grant.expires_at = policy.ttl.map(|ttl| not_before + ttl);
        self.store.replace_grant(session_id, grant).await
    }

    /// `Find`; if found with a currently-valid grant, return unchanged;
    /// else mint a fresh grant on the existing row, or insert a new
    /// session. A `(device_id, contact_id)` uniqueness conflict on insert
    /// is resolved by re-reading rather than propagated as an error.
    pub async fn authenticate(
        &self,
        dc: i64,
        app_id: &str,
        device: Device,
        contact: ContactKey,
        policy: TokenPolicy,
    ) -> Result<Session, CoreError> {
        let now = OffsetDateTime::now_utc();
        if let Some(existing) = self.find(dc, &device.id, &contact).await? {
            if let Some(grant) = &existing.grant {
                if grant.verify(now).is_ok() {
                    return Ok(existing);
                }
            }
            return self.mint_grant(existing.id, now, policy).await;
        }

        let fresh = Session::new_in_memory(dc, app_id, device, contact.clone());
        match self.store.insert(fresh).await {
            Ok(inserted) => self.mint_grant(inserted.id, now, policy).await,
            Err(err) if err.kind == crate::error::CoreErrorKind::Conflict => {
                let existing = self
                    .find(dc, "", &contact)
                    .await?
                    .ok_or_else(|| CoreError::internal("session: conflict without a readable row"))?;
                self.mint_grant(existing.id, now, policy).await
            }
            Err(err) => Err(err),
        }
    }

    pub async fn logout(&self, session_id: Uuid) -> Result<(), CoreError> {
        self.store.delete(session_id).await
    }

    /// Writes the subscription onto the session; gating against the
    /// Application's push capability matrix is the caller's
    /// responsibility (it needs the Application, which the manager does
    /// not hold).
    pub async fn register_push(
        &self,
        session_id: Uuid,
        device: Device,
        subscription: PushSubscription,
    ) -> Result<Session, CoreError> {
        self.store.set_push(session_id, device, Some(subscription)).await
    }

    /// Clears the subscription only if it exactly equals the one supplied
    /// (proof of possession); otherwise a `BAD_REQUEST`.
    pub async fn unregister_push(
        &self,
        session: &Session,
        supplied: &PushSubscription,
    ) -> Result<Session, CoreError> {
        match session.push() {
            Some(current) if current == supplied => {
                self.store
                    .set_push(session.id, session.device.clone(), None)
                    .await
            }
            _ => Err(CoreError::bad_request("messaging: invalid PUSH token")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::memory::MemorySessionStore;

    fn device(id: &str) -> Device {
        Device {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn authenticate_mints_fresh_session_and_grant() {
        let manager = SessionManager::new(Arc::new(MemorySessionStore::new()));
        let contact = ContactKey::by_subject(7, "idp.example", "42");
        let session = manager
            .authenticate(7, "A1", device("D1"), contact, TokenPolicy::default())
            .await
            .unwrap();
        assert!(session.is_persisted());
        let grant = session.grant.expect("grant minted");
        assert!(!grant.token.is_empty());
        assert!(grant.expires_at.is_none());
    }

    #[tokio::test]
    async fn authenticate_reuses_existing_valid_session() {
        let manager = SessionManager::new(Arc::new(MemorySessionStore::new()));
        let contact = ContactKey::by_subject(7, "idp.example", "42");
        let first = manager
            .authenticate(7, "A1", device("D1"), contact.clone(), TokenPolicy::default())
            .await
            .unwrap();
        let second = manager
            .authenticate(7, "A1", device("D1"), contact, TokenPolicy::default())
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.grant.unwrap().token, second.grant.unwrap().token);
    }

    #[tokio::test]
    async fn unregister_push_requires_exact_match() {
        let manager = SessionManager::new(Arc::new(MemorySessionStore::new()));
        let contact = ContactKey::by_subject(7, "idp.example", "42");
        let mut session = manager
            .authenticate(7, "A1", device("D1"), contact, TokenPolicy::default())
            .await
            .unwrap();
        let sub = PushSubscription::Fcm {
            token: "tok_fcm_xyz".into(),
        };
        session = manager
            .register_push(session.id, session.device.clone(), sub.clone())
            .await
            .unwrap();

        let wrong = PushSubscription::Fcm {
            token: "other".into(),
        };
        let err = manager.unregister_push(&session, &wrong).await.unwrap_err();
        assert_eq!(err.kind, crate::error::CoreErrorKind::BadRequest);

        let cleared = manager.unregister_push(&session, &sub).await.unwrap();
        assert!(cleared.push().is_none());
    }
}
