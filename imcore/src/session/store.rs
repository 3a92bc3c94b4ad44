use imcore_types::{AccessToken, ContactKey, Device, PushSubscription, Session};

use crate::error::CoreError;

/// Paging + filters accepted by `GetAuthorizations` / `SessionStore::list`.
#[derive(Clone, Debug, Default)]
pub struct ListSessionsFilter {
    pub dc: Option<i64>,
    pub id: Option<uuid::Uuid>,
    pub app_id: Option<String>,
    pub device_id: Option<String>,
    pub contact: Option<ContactKey>,
    pub token: Option<String>,
    pub push_only: bool,
    pub page: u32,
    pub size: u32,
}

impl ListSessionsFilter {
    pub fn by_token(token: impl Into<String>) -> Self {
        ListSessionsFilter {
            token: Some(token.into()),
            page: 1,
            size: 1,
            ..Default::default()
        }
    }

    pub fn by_device_contact(dc: i64, device_id: impl Into<String>, contact: ContactKey) -> Self {
        ListSessionsFilter {
            dc: Some(dc),
            device_id: Some(device_id.into()),
            contact: Some(contact),
            page: 1,
            size: 1,
            ..Default::default()
        }
    }
}

/// Persists sessions, access-token grants and device PUSH subscriptions;
/// the implementation is responsible for enforcing the
/// `(device_id, contact_id)` uniqueness invariant, ordering
/// (`created_at DESC, id ASC`), and treating a unique-constraint violation
/// on insert as "re-read and return the existing row" rather than an error.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn list(&self, filter: ListSessionsFilter) -> Result<Vec<Session>, CoreError>;

    async fn find_one(&self, filter: ListSessionsFilter) -> Result<Option<Session>, CoreError> {
        Ok(self.list(filter).await?.into_iter().next())
    }

    /// Inserts a new session row. On a `(device_id, contact_id)` unique
    /// violation the caller must re-read via `find_one` instead of
    /// surfacing the conflict — see spec's failure-semantics note.
    async fn insert(&self, session: Session) -> Result<Session, CoreError>;

    async fn replace_grant(&self, session_id: uuid::Uuid, grant: AccessToken) -> Result<Session, CoreError>;

    async fn set_push(
        &self,
        session_id: uuid::Uuid,
        device: Device,
        push: Option<PushSubscription>,
    ) -> Result<Session, CoreError>;

    async fn delete(&self, session_id: uuid::Uuid) -> Result<(), CoreError>;
}
