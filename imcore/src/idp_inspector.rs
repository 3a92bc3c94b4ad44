use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::CoreError;

/// Introspection record returned by the external identity provider.
#[derive(Clone, Debug, Deserialize)]
pub struct IntrospectionRecord {
    pub dc: i64,
    pub user_id: i64,
    pub username: String,
    pub name: String,
    /// not-before, milliseconds since epoch.
    pub updated_at: i64,
    /// expiry, milliseconds since epoch.
    pub expires_at: i64,
}

impl IntrospectionRecord {
    pub fn not_before(&self) -> Option<time::OffsetDateTime> {
        (self.updated_at > 0).then(|| {
            time::OffsetDateTime::from_unix_timestamp_nanos(self.updated_at as i128 * 1_000_000)
                .unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
        })
    }

    pub fn expires(&self) -> Option<time::OffsetDateTime> {
        (self.expires_at > 0).then(|| {
            time::OffsetDateTime::from_unix_timestamp_nanos(self.expires_at as i128 * 1_000_000)
                .unwrap_or(time::OffsetDateTime::UNIX_EPOCH)
        })
    }

    pub fn is_valid_at(&self, now: time::OffsetDateTime) -> bool {
        let nbf_ok = self.not_before().map(|nbf| nbf <= now).unwrap_or(true);
        let exp_ok = self.expires().map(|exp| now < exp).unwrap_or(true);
        nbf_ok && exp_ok
    }
}

struct CacheEntry {
    record: Arc<IntrospectionRecord>,
    expires_at: Instant,
}

/// Calls the external IdP's introspection endpoint, subject to a short TTL
/// cache keyed by the raw bearer token (size-unbounded but expirable).
/// Grounded on `vpopescu-ark-mcp/src/server/auth.rs`'s `AuthState`
/// session-cache pattern — the closest analogue for an in-process TTL
/// cache anywhere in the corpus.
pub struct IdpInspector {
    http: reqwest::Client,
    introspect_url: String,
    ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl IdpInspector {
    pub fn new(http: reqwest::Client, introspect_url: impl Into<String>, ttl: Duration) -> Self {
        IdpInspector {
            http,
            introspect_url: introspect_url.into(),
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Default TTL per spec.md §4.2.3.
    pub fn with_default_ttl(http: reqwest::Client, introspect_url: impl Into<String>) -> Self {
        Self::new(http, introspect_url, Duration::from_secs(60))
    }

    pub async fn inspect(&self, bearer: &str) -> Result<Arc<IntrospectionRecord>, CoreError> {
        if let Some(cached) = self.cached(bearer).await {
            return Ok(cached);
        }
        let resp = self
            .http
            .get(&self.introspect_url)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| CoreError::internal(format!("idp introspection: {e}")))?;
        if resp.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CoreError::unauthenticated("messaging: token invalid"));
        }
        let record: IntrospectionRecord = resp
            .error_for_status()
            .map_err(|e| CoreError::internal(format!("idp introspection: {e}")))?
            .json()
            .await
            .map_err(|e| CoreError::internal(format!("idp introspection: {e}")))?;
        let record = Arc::new(record);
        self.cache.write().await.insert(
            bearer.to_string(),
            CacheEntry {
                record: record.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(record)
    }

    async fn cached(&self, bearer: &str) -> Option<Arc<IntrospectionRecord>> {
        let cache = self.cache.read().await;
        cache.get(bearer).and_then(|entry| {
            if entry.expires_at > Instant::now() {
                Some(entry.record.clone())
            } else {
                None
            }
        })
    }

    /// Drops expired entries; safe to call periodically from a background
    /// task. Correctness never depends on this running — only the TTL
    /// check on read does (see the redesign hint in spec.md §9).
    pub async fn sweep_expired(&self) {
        let now = Instant::now();
        self.cache.write().await.retain(|_, entry| entry.expires_at > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_valid_at_respects_not_before_and_expiry() {
        let now = time::OffsetDateTime::now_utc();
        let record = IntrospectionRecord {
            dc: 7,
            user_id: 42,
            username: "ada".into(),
            name: "Ada Lovelace".into(),
            updated_at: (now.unix_timestamp() - 10) * 1000,
            expires_at: (now.unix_timestamp() + 10) * 1000,
        };
        assert!(record.is_valid_at(now));

        let expired = IntrospectionRecord {
            expires_at: (now.unix_timestamp() - 1) * 1000,
            ..record
        };
        assert!(!expired.is_valid_at(now));
    }
}
