use std::collections::HashMap;
use std::sync::Mutex;

use imcore_types::{Contact, ContactKey};

use crate::error::CoreError;

/// External search/upsert of contact profiles. Contact-profile CRUD
/// beyond search/upsert is out of scope (spec.md §1) — the core only ever
/// calls these two operations.
#[async_trait::async_trait]
pub trait ContactClient: Send + Sync {
    async fn find(&self, key: &ContactKey) -> Result<Option<Contact>, CoreError>;
    async fn upsert(&self, contact: Contact) -> Result<Contact, CoreError>;
}

/// HTTP-backed implementation calling an external contact service.
pub struct HttpContactClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpContactClient {
    pub fn new(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        HttpContactClient {
            base_url: base_url.into(),
            http,
        }
    }
}

#[async_trait::async_trait]
impl ContactClient for HttpContactClient {
    async fn find(&self, key: &ContactKey) -> Result<Option<Contact>, CoreError> {
        let url = format!("{}/contacts/search", self.base_url);
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("dc", key.dc.to_string()),
                ("id", key.id.clone()),
                ("iss", key.iss.clone()),
                ("sub", key.sub.clone()),
            ])
            .send()
            .await
            .map_err(|e| CoreError::internal(format!("contact service: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp
            .error_for_status()
            .map_err(|e| CoreError::internal(format!("contact service: {e}")))?;
        let contact = resp
            .json::<Option<Contact>>()
            .await
            .map_err(|e| CoreError::internal(format!("contact service: {e}")))?;
        Ok(contact)
    }

    async fn upsert(&self, contact: Contact) -> Result<Contact, CoreError> {
        let url = format!("{}/contacts/upsert", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&contact)
            .send()
            .await
            .map_err(|e| CoreError::internal(format!("contact service: {e}")))?
            .error_for_status()
            .map_err(|e| CoreError::internal(format!("contact service: {e}")))?;
        resp.json::<Contact>()
            .await
            .map_err(|e| CoreError::internal(format!("contact service: {e}")))
    }
}

/// In-memory double used by this crate's own tests.
#[derive(Default)]
pub struct MemoryContactClient {
    by_sub: Mutex<HashMap<(i64, String, String), Contact>>,
}

impl MemoryContactClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, contact: Contact) {
        self.by_sub.lock().unwrap().insert(
            (contact.dc, contact.iss.clone(), contact.sub.clone()),
            contact,
        );
    }
}

#[async_trait::async_trait]
impl ContactClient for MemoryContactClient {
    async fn find(&self, key: &ContactKey) -> Result<Option<Contact>, CoreError> {
        let store = self.by_sub.lock().unwrap();
        if key.has_id() {
            return Ok(store.values().find(|c| c.id.to_string() == key.id).cloned());
        }
        Ok(store.get(&(key.dc, key.iss.clone(), key.sub.clone())).cloned())
    }

    async fn upsert(&self, contact: Contact) -> Result<Contact, CoreError> {
        self.by_sub.lock().unwrap().insert(
            (contact.dc, contact.iss.clone(), contact.sub.clone()),
            contact.clone(),
        );
        Ok(contact)
    }
}
