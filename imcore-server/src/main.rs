use std::net::SocketAddr;

use imcore::config::ServiceConfig;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

mod api;
mod error;
mod middleware;
mod state;

/// Bootstraps the account/authorization core's HTTP surface. Grounded on
/// `runelink-server/src/main.rs`'s startup sequence (dotenv, env_logger,
/// config load, pool/state construction, `axum::serve`).
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::var("IMCORE_CONFIG").unwrap_or_else(|_| "imcore.toml".to_string());
    let config = ServiceConfig::from_toml_file(&config_path)?.apply_env_overrides();

    let bind_addr = config.bind_addr.clone();
    let app_state = state::AppState::build(config).await?;

    let app = api::router()
        .with_state(app_state)
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;

    log::info!("Starting imcore-server on {addr}");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
