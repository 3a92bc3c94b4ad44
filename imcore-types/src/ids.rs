use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Composite identity key: tenant, internal id, issuer, subject.
///
/// `id` is usually empty until a contact row has been created; `(iss, sub)`
/// is the stable external-identity lookup key.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ContactKey {
    pub dc: i64,
    pub id: String,
    pub iss: String,
    pub sub: String,
}

impl ContactKey {
    pub fn by_id(dc: i64, id: impl Into<String>) -> Self {
        ContactKey {
            dc,
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn by_subject(dc: i64, iss: impl Into<String>, sub: impl Into<String>) -> Self {
        ContactKey {
            dc,
            iss: iss.into(),
            sub: sub.into(),
            ..Default::default()
        }
    }

    pub fn has_id(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn has_subject(&self) -> bool {
        !self.iss.is_empty() && !self.sub.is_empty()
    }
}

impl fmt::Display for ContactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.dc, self.id, self.iss, self.sub)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid contact key: {0}")]
pub struct ParseContactKeyError(String);

impl FromStr for ContactKey {
    type Err = ParseContactKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(4, ':');
        let dc = parts
            .next()
            .ok_or_else(|| ParseContactKeyError(s.to_string()))?
            .parse::<i64>()
            .map_err(|_| ParseContactKeyError(s.to_string()))?;
        let id = parts
            .next()
            .ok_or_else(|| ParseContactKeyError(s.to_string()))?
            .to_string();
        let iss = parts
            .next()
            .ok_or_else(|| ParseContactKeyError(s.to_string()))?
            .to_string();
        let sub = parts
            .next()
            .ok_or_else(|| ParseContactKeyError(s.to_string()))?
            .to_string();
        Ok(ContactKey { dc, id, iss, sub })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_string_form() {
        let key = ContactKey::by_subject(7, "idp.example", "42");
        let rendered = key.to_string();
        let parsed: ContactKey = rendered.parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn by_id_has_id_not_subject() {
        let key = ContactKey::by_id(7, "c-1");
        assert!(key.has_id());
        assert!(!key.has_subject());
    }
}
