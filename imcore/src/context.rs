use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use imcore_types::{Application, Contact, Device, Session};
use time::OffsetDateTime;
use tokio::time::Instant as TokioInstant;

use crate::error::CoreError;
use crate::pipeline::Acr;

static CONN_SEQ: AtomicU64 = AtomicU64::new(0);

/// Case-insensitive, last-value-wins header multimap. Names are lower-cased
/// on insert; repeated headers coalesce to the last value, matching the
/// well-known `x-webitel-*` header set's HTTP/2-style semantics.
#[derive(Clone, Debug, Default)]
pub struct HeaderBag {
    values: HashMap<String, Vec<String>>,
}

impl HeaderBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.values
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// Last value for `name`, or empty string if absent (mirrors
    /// `CoalesceLast` over a repeated header).
    pub fn get(&self, name: &str) -> &str {
        self.values
            .get(&name.to_ascii_lowercase())
            .and_then(|vs| vs.last())
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Well-known header names consumed by the pipeline.
pub mod headers {
    pub const CLIENT_ID: &str = "x-webitel-client";
    pub const DEVICE_ID: &str = "x-webitel-device";
    pub const ACCESS_TOKEN: &str = "x-webitel-access";
    pub const USER_AGENT: &str = "user-agent";
    pub const FORWARDED_FOR: &str = "x-forwarded-for";
    pub const REAL_IP: &str = "x-real-ip";
    pub const FROM_SERVICE: &str = "from-service";
    pub const FROM_SERVICE_ID: &str = "from-service-id";
    pub const ORIGIN: &str = "origin";

    /// Headers whose values must never appear unredacted in a log record.
    pub const REDACTED: &[&str] = &["authorization", ACCESS_TOKEN, DEVICE_ID, CLIENT_ID];
}

/// Request-scoped bag of identity, device, session, app, deadline and
/// logger, constructed once per inbound RPC and threaded through the
/// pipeline by reference (never stashed in ambient/thread-local state).
pub struct RequestContext {
    /// `"<conn-seq>.<rpc-seq>"`, monotonic per process.
    pub id: String,
    pub date: OffsetDateTime,
    pub header: HeaderBag,
    pub peer: Option<SocketAddr>,
    pub deadline: Option<TokioInstant>,

    pub dc: i64,
    pub app: Option<Arc<Application>>,
    pub device: Option<Device>,
    pub acr: Option<Acr>,
    pub contact: Option<Contact>,
    pub session: Option<Session>,
    pub error: Option<CoreError>,
}

impl RequestContext {
    /// Allocates the next `<conn-seq>.<rpc-seq>` id for a freshly accepted
    /// connection; `rpc_seq` is owned by the caller (one per request on
    /// that connection).
    pub fn next_conn_seq() -> u64 {
        CONN_SEQ.fetch_add(1, Ordering::Relaxed)
    }

    pub fn new(conn_seq: u64, rpc_seq: u64, header: HeaderBag, peer: Option<SocketAddr>) -> Self {
        RequestContext {
            id: format!("{conn_seq}.{rpc_seq}"),
            date: OffsetDateTime::now_utc(),
            header,
            peer,
            deadline: None,
            dc: 0,
            app: None,
            device: None,
            acr: None,
            contact: None,
            session: None,
            error: None,
        }
    }

    /// Refreshes `date` for a new payload frame on a streaming RPC so
    /// downstream observers see a monotonically non-decreasing clock.
    pub fn touch(&mut self) {
        let now = OffsetDateTime::now_utc();
        if now > self.date {
            self.date = now;
        }
    }

    pub fn with_deadline(mut self, deadline: TokioInstant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|d| TokioInstant::now() >= d)
            .unwrap_or(false)
    }

    pub fn client_id_header(&self) -> &str {
        self.header.get(headers::CLIENT_ID)
    }

    pub fn device_id_header(&self) -> &str {
        self.header.get(headers::DEVICE_ID)
    }

    pub fn access_token_header(&self) -> &str {
        self.header.get(headers::ACCESS_TOKEN)
    }

    pub fn from_service_header(&self) -> &str {
        self.header.get(headers::FROM_SERVICE)
    }

    pub fn from_service_id_header(&self) -> &str {
        self.header.get(headers::FROM_SERVICE_ID)
    }

    /// `from-service`/`from-service-id` is "[Service] authorization": the
    /// mechanism admin-scoped RPCs (`SearchApps`/`CreateApp`) use instead of
    /// the end-user ACR schemes. Both headers must be present.
    pub fn require_service_auth(&self) -> Result<(), CoreError> {
        if self.from_service_header().is_empty() || self.from_service_id_header().is_empty() {
            return Err(CoreError::unauthenticated("messaging: service authorization required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_bag_is_case_insensitive_last_wins() {
        let mut bag = HeaderBag::new();
        bag.insert("X-Webitel-Access", "first");
        bag.insert("x-webitel-access", "second");
        assert_eq!(bag.get("X-WEBITEL-ACCESS"), "second");
    }

    #[test]
    fn next_conn_seq_is_monotonic() {
        let a = RequestContext::next_conn_seq();
        let b = RequestContext::next_conn_seq();
        assert!(b > a);
    }
}
