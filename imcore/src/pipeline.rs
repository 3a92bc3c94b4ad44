use imcore_types::{ContactKey, Session};

use crate::context::RequestContext;
use crate::error::CoreError;

/// Marker recorded on `RequestContext::acr` once a scheme accepts — which
/// scheme matched, and the credential it unpacked. Carries just enough for
/// the post-pipeline steps (contact upsert, session resolution) to proceed
/// without re-deriving what the scheme already worked out.
#[derive(Clone, Debug)]
pub enum Acr {
    Session { contact: ContactKey },
    Jwt { contact: ContactKey },
    UpstreamIdp { contact: ContactKey, bearer: String },
}

impl Acr {
    pub fn contact(&self) -> &ContactKey {
        match self {
            Acr::Session { contact } => contact,
            Acr::Jwt { contact } => contact,
            Acr::UpstreamIdp { contact, .. } => contact,
        }
    }
}

/// The three-valued result every scheme returns, per spec §4.2's table.
pub enum AuthOutcome {
    /// No credentials this scheme recognises; try the next one.
    NotRecognized,
    /// Accepted; authorization established.
    Accepted(Acr),
    /// Recognised credentials but invalid — stop with a fatal error.
    Rejected(CoreError),
    /// Transient lookup failure; try the next scheme, but remember this error.
    Transient(CoreError),
}

/// A single authentication scheme. Implemented as an async fn per variant
/// rather than a trait object — the scheme set is closed and enumerable
/// (see the redesign hint in spec.md §9), so `AuthScheme` below is a sum
/// type, not a registry.
#[async_trait::async_trait]
pub trait Scheme: Send + Sync {
    async fn authenticate(&self, ctx: &mut RequestContext) -> AuthOutcome;
    fn name(&self) -> &'static str;
}

/// Orders and short-circuits the authentication schemes; enforces "once
/// accepted, no further schemes run." A plain `for`-loop over a fixed list,
/// trivially testable.
pub struct AuthPipeline {
    schemes: Vec<Box<dyn Scheme>>,
}

impl AuthPipeline {
    pub fn new(schemes: Vec<Box<dyn Scheme>>) -> Self {
        AuthPipeline { schemes }
    }

    /// Runs the fixed scheme order until one accepts or rejects. Returns
    /// `Ok(None)` if no scheme recognised the request (caller decides
    /// whether that's fatal via `require_authenticated`).
    pub async fn authenticate(&self, ctx: &mut RequestContext) -> Result<Option<Acr>, CoreError> {
        let mut last_transient: Option<CoreError> = None;
        for scheme in &self.schemes {
            match scheme.authenticate(ctx).await {
                AuthOutcome::NotRecognized => continue,
                AuthOutcome::Accepted(acr) => {
                    ctx.acr = Some(acr.clone());
                    return Ok(Some(acr));
                }
                AuthOutcome::Rejected(err) => {
                    ctx.error = Some(CoreError::new(err.kind, err.message.clone()));
                    return Err(err);
                }
                AuthOutcome::Transient(err) => {
                    last_transient = Some(err);
                    continue;
                }
            }
        }
        if let Some(err) = last_transient {
            return Err(err);
        }
        Ok(None)
    }

    pub async fn require_authenticated(&self, ctx: &mut RequestContext) -> Result<Acr, CoreError> {
        match self.authenticate(ctx).await? {
            Some(acr) => Ok(acr),
            None => Err(CoreError::unauthenticated("messaging: no accepted credentials")),
        }
    }
}

/// Convenience re-export: the existing-session check used by `Inspect`
/// and friends (`current ⇔ session.id == request.session.id`).
pub fn is_current(session: &Session, request_session_id: uuid::Uuid) -> bool {
    session.id == request_session_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingScheme {
        name: &'static str,
        calls: Arc<AtomicUsize>,
        outcome: fn() -> AuthOutcome,
    }

    #[async_trait::async_trait]
    impl Scheme for CountingScheme {
        async fn authenticate(&self, _ctx: &mut RequestContext) -> AuthOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(0, 1, crate::context::HeaderBag::new(), None)
    }

    #[tokio::test]
    async fn stops_at_first_accept_and_skips_the_rest() {
        let calls_a = Arc::new(AtomicUsize::new(0));
        let calls_b = Arc::new(AtomicUsize::new(0));
        let pipeline = AuthPipeline::new(vec![
            Box::new(CountingScheme {
                name: "a",
                calls: calls_a.clone(),
                outcome: || {
                    AuthOutcome::Accepted(Acr::Session {
                        contact: ContactKey::default(),
                    })
                },
            }),
            Box::new(CountingScheme {
                name: "b",
                calls: calls_b.clone(),
                outcome: || AuthOutcome::NotRecognized,
            }),
        ]);
        let mut ctx = ctx();
        let acr = pipeline.authenticate(&mut ctx).await.unwrap();
        assert!(acr.is_some());
        assert_eq!(calls_a.load(Ordering::SeqCst), 1);
        assert_eq!(calls_b.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn no_scheme_accepting_is_not_fatal_until_required() {
        let pipeline = AuthPipeline::new(vec![Box::new(CountingScheme {
            name: "a",
            calls: Arc::new(AtomicUsize::new(0)),
            outcome: || AuthOutcome::NotRecognized,
        })]);
        let mut ctx = ctx();
        assert!(pipeline.authenticate(&mut ctx).await.unwrap().is_none());
        let mut ctx = ctx();
        assert!(pipeline.require_authenticated(&mut ctx).await.is_err());
    }
}
