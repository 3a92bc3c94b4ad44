use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::push::PushProvider;

/// Per-issuer constraint set and push capability matrix an Application
/// may opt into. Every field empty/unset means "unconstrained".
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConstraints {
    /// Shell-ish substrings/prefixes matched against the parsed user-agent name.
    pub user_agents: Vec<String>,
    /// CIDR networks the device's remote address must fall within.
    pub networks: Vec<String>,
    /// Allowed `Origin` header values for browser clients.
    pub origins: Vec<String>,
    /// Issuers this Application accepts JWT identities from.
    pub issuers: Vec<String>,
    /// `iss` -> Contact.type mapping; falls back to `iss` itself when absent.
    pub issuer_contact_type: HashMap<String, String>,
    /// Push providers this Application is permitted to register.
    pub push_providers: Vec<PushProvider>,
}

impl ClientConstraints {
    pub fn contact_type_for_issuer(&self, iss: &str) -> String {
        self.issuer_contact_type
            .get(iss)
            .cloned()
            .unwrap_or_else(|| iss.to_string())
    }

    pub fn allows_issuer(&self, iss: &str) -> bool {
        self.issuers.iter().any(|i| i == iss)
    }

    pub fn allows_push(&self, provider: PushProvider) -> bool {
        self.push_providers.is_empty() || self.push_providers.contains(&provider)
    }
}

/// Configuration of a client program permitted to talk to the service.
/// Created externally; the core treats this row as read-only.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Application {
    pub dc: i64,
    pub id: Uuid,
    pub client_id: String,
    pub name: String,
    pub about: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub constraints: ClientConstraints,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Application {
    pub fn contact_type_for(&self, iss: &str) -> String {
        self.constraints.contact_type_for_issuer(iss)
    }
}
