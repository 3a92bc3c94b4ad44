use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// OIDC-like naming claims. `Parts()` drops empty/blank parts and collapses
/// internal whitespace runs to a single space; `common_name()` synthesises
/// a full name from the parts when one was never set directly.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactName {
    pub common_name: String,
    pub given_name: String,
    pub middle_name: String,
    pub family_name: String,
}

fn normalize_part(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl ContactName {
    /// Non-empty, whitespace-normalized `[given, middle, family]`.
    pub fn parts(&self) -> Vec<String> {
        [&self.given_name, &self.middle_name, &self.family_name]
            .into_iter()
            .map(|p| normalize_part(p))
            .filter(|p| !p.is_empty())
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        !normalize_part(&self.common_name).is_empty() || !self.parts().is_empty()
    }

    /// Joins non-empty normalized parts with a single space.
    pub fn synthesize_common_name(&self) -> String {
        self.parts().join(" ")
    }

    pub fn resolved_common_name(&self) -> String {
        let common = normalize_part(&self.common_name);
        if !common.is_empty() {
            common
        } else {
            self.synthesize_common_name()
        }
    }
}

impl fmt::Display for ContactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resolved_common_name())
    }
}

/// End-user profile addressable by `(iss, sub)` and by internal id.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Contact {
    pub id: Uuid,
    pub dc: i64,
    pub iss: String,
    pub sub: String,
    /// client-id of the Application that first introduced the contact.
    pub app: String,
    /// protocol tag resolved from issuer via the Application's mapping.
    #[cfg_attr(feature = "sqlx", sqlx(rename = "contact_type"))]
    pub r#type: String,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub name: ContactName,
    pub username: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub birthdate: Option<OffsetDateTime>,
    pub zoneinfo: Option<String>,
    pub profile: Option<String>,
    pub picture: Option<String>,
    pub gender: Option<String>,
    pub locale: Option<String>,
    pub email: Option<String>,
    pub email_verified: bool,
    pub phone: Option<String>,
    pub phone_verified: bool,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub metadata: HashMap<String, String>,
}

impl fmt::Debug for Contact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contact")
            .field("id", &self.id)
            .field("dc", &self.dc)
            .field("iss", &self.iss)
            .field("sub", &self.sub)
            .field("type", &self.r#type)
            .field("name", &self.name.resolved_common_name())
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("phone", &self.phone.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts_drops_blank_and_collapses_whitespace() {
        let name = ContactName {
            given_name: "Ada   ".into(),
            middle_name: "   ".into(),
            family_name: "Lovelace  Byron".into(),
            ..Default::default()
        };
        let parts = name.parts();
        assert_eq!(parts, vec!["Ada".to_string(), "Lovelace Byron".to_string()]);
        assert!(parts.iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn synthesizes_common_name_when_unset() {
        let name = ContactName {
            given_name: "Ada".into(),
            family_name: "Lovelace".into(),
            ..Default::default()
        };
        assert_eq!(name.resolved_common_name(), "Ada Lovelace");
    }

    #[test]
    fn is_valid_requires_common_name_or_parts() {
        let empty = ContactName::default();
        assert!(!empty.is_valid());
    }
}
