use std::sync::Arc;

use imcore::app_resolver::{AppResolver, PostgresAppStore};
use imcore::config::ServiceConfig;
use imcore::contact_client::{ContactClient, HttpContactClient};
use imcore::idp_inspector::IdpInspector;
use imcore::jwt_verifier::UnverifiedJwtDecoder;
use imcore::pipeline::AuthPipeline;
use imcore::schemes::{JwtAuthScheme, SessionAuthScheme, UpstreamIdpAuthScheme};
use imcore::session::SessionManager;
use imcore::session::postgres::PostgresSessionStore;

/// Everything a request handler needs, composed once at startup.
/// Grounded on `runelink-server/src/state.rs`'s flat, `Clone`-able
/// `AppState` carrying `Arc`-wrapped shared collaborators.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub session_manager: Arc<SessionManager<PostgresSessionStore>>,
    pub app_resolver: Arc<AppResolver<PostgresAppStore>>,
    pub contact_client: Arc<dyn ContactClient>,
    pub idp_inspector: Arc<IdpInspector>,
    pub pipeline: Arc<AuthPipeline>,
}

impl AppState {
    pub async fn build(config: ServiceConfig) -> Result<Self, sqlx::Error> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect(&config.database_url)
            .await?;

        let session_store = Arc::new(PostgresSessionStore::new(pool.clone()));
        let session_manager = Arc::new(SessionManager::new(session_store));

        let app_store = PostgresAppStore::new(pool.clone());
        let app_resolver = Arc::new(AppResolver::new(app_store, config.app_cache_ttl()));

        let http = reqwest::Client::new();
        let contact_client: Arc<dyn ContactClient> =
            Arc::new(HttpContactClient::new(config.contact_service_url.clone(), http.clone()));

        let idp_inspector = Arc::new(IdpInspector::new(
            http.clone(),
            config.idp_introspect_url.clone(),
            config.idp_cache_ttl(),
        ));

        let session_scheme = SessionAuthScheme {
            session_manager: session_manager.clone(),
            contact_client: contact_client.clone(),
        };
        let jwt_scheme = JwtAuthScheme {
            verifier: UnverifiedJwtDecoder,
            app_resolver: app_resolver.clone(),
            contact_client: contact_client.clone(),
        };
        let upstream_scheme = UpstreamIdpAuthScheme {
            inspector: idp_inspector.clone(),
            session_manager: session_manager.clone(),
            contact_client: contact_client.clone(),
        };

        let pipeline = Arc::new(AuthPipeline::new(vec![
            Box::new(session_scheme),
            Box::new(jwt_scheme),
            Box::new(upstream_scheme),
        ]));

        Ok(AppState {
            config: Arc::new(config),
            session_manager,
            app_resolver,
            contact_client,
            idp_inspector,
            pipeline,
        })
    }
}
