use std::collections::HashMap;
use std::sync::Mutex;

use imcore_types::{AccessToken, Device, PushSubscription, Session};
use uuid::Uuid;

use crate::error::CoreError;
use crate::session::store::{ListSessionsFilter, SessionStore};

/// In-memory `SessionStore` used by this crate's own tests and as a
/// standalone-mode backend. Enforces the same `(device_id, contact_id)`
/// uniqueness invariant and ordering contract as the Postgres adapter.
#[derive(Default)]
pub struct MemorySessionStore {
    rows: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn conflicting(
        rows: &HashMap<Uuid, Session>,
        dc: i64,
        device_id: &str,
        contact: &imcore_types::ContactKey,
    ) -> Option<Uuid> {
        rows.values()
            .find(|s| {
                s.dc == dc
                    && s.device.id == device_id
                    && ((contact.has_id() && s.contact.id == contact.id)
                        || (contact.has_subject() && s.contact.iss == contact.iss && s.contact.sub == contact.sub))
            })
            .map(|s| s.id)
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn list(&self, filter: ListSessionsFilter) -> Result<Vec<Session>, CoreError> {
        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<Session> = rows
            .values()
            .filter(|s| {
                if let Some(dc) = filter.dc {
                    if s.dc != dc {
                        return false;
                    }
                }
                if let Some(id) = filter.id {
                    if s.id != id {
                        return false;
                    }
                }
                if let Some(app_id) = &filter.app_id {
                    if &s.app_id != app_id {
                        return false;
                    }
                }
                if let Some(device_id) = &filter.device_id {
                    if !device_id.is_empty() && &s.device.id != device_id {
                        return false;
                    }
                }
                if let Some(contact) = &filter.contact {
                    let matches_id = contact.has_id() && s.contact.id == contact.id;
                    let matches_sub =
                        contact.has_subject() && s.contact.iss == contact.iss && s.contact.sub == contact.sub;
                    if !(matches_id || matches_sub) {
                        return false;
                    }
                }
                if let Some(token) = &filter.token {
                    if s.grant.as_ref().map(|g| &g.token) != Some(token) {
                        return false;
                    }
                }
                if filter.push_only && s.push().is_none() {
                    return false;
                }
                true
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        let size = if filter.size == 0 { matched.len() as u32 } else { filter.size };
        let page = filter.page.max(1);
        let start = ((page - 1) * size) as usize;
        Ok(matched.into_iter().skip(start).take(size as usize).collect())
    }

    async fn insert(&self, mut session: Session) -> Result<Session, CoreError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(existing) = Self::conflicting(&rows, session.dc, &session.device.id, &session.contact) {
            return Err(CoreError::conflict(format!(
                "session: duplicate (device_id, contact_id) for existing session {existing}"
            )));
        }
        session.id = Uuid::new_v4();
        rows.insert(session.id, session.clone());
        Ok(session)
    }

    async fn replace_grant(&self, session_id: Uuid, grant: AccessToken) -> Result<Session, CoreError> {
        let mut rows = self.rows.lock().unwrap();
        let session = rows
            .get_mut(&session_id)
            .ok_or_else(|| CoreError::not_found("session: not found"))?;
        session.grant = Some(grant);
        Ok(session.clone())
    }

    async fn set_push(
        &self,
        session_id: Uuid,
        device: Device,
        push: Option<PushSubscription>,
    ) -> Result<Session, CoreError> {
        let mut rows = self.rows.lock().unwrap();
        let session = rows
            .get_mut(&session_id)
            .ok_or_else(|| CoreError::not_found("session: not found"))?;
        session.device = device;
        session.device.push = push;
        Ok(session.clone())
    }

    async fn delete(&self, session_id: Uuid) -> Result<(), CoreError> {
        self.rows.lock().unwrap().remove(&session_id);
        Ok(())
    }
}
