use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::http::HeaderMap;
use imcore::context::{HeaderBag, RequestContext};

/// One counter per accepted connection's RPC sequence, re-derived per
/// request since axum gives us no persistent connection handle to hang a
/// counter off of. Mirrors the intent of spec.md §4.1's
/// `"<conn-seq>.<rpc-seq>"` id without requiring a connection-scoped
/// extractor axum doesn't expose for plain HTTP.
static RPC_SEQ: AtomicU64 = AtomicU64::new(0);

/// Builds a fresh `RequestContext` from the incoming header map and peer
/// address, the way `runelink-server`'s handlers read `State`/`ConnectInfo`
/// extractors before doing any real work.
pub fn build_context(headers: &HeaderMap, peer: Option<SocketAddr>) -> RequestContext {
    let mut bag = HeaderBag::new();
    for (name, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            bag.insert(name.as_str(), value);
        }
    }
    let conn_seq = RequestContext::next_conn_seq();
    let rpc_seq = RPC_SEQ.fetch_add(1, Ordering::Relaxed);
    RequestContext::new(conn_seq, rpc_seq, bag, peer)
}
