//! Basket Lens API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use lens_chain::ChainSource;
use lens_common::config::AppConfig;

use lens_api::middleware::auth::encode_jwt;
use lens_api::routes::create_router;
use lens_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("lens_api=debug,lens_engine=debug,lens_chain=info,tower_http=debug")
        }))
        .init();

    // Load configuration
    let config = AppConfig::from_env()?;

    // `lens-api keeper-token <name>` prints a keeper JWT and exits
    let args: Vec<String> = std::env::args().collect();
    if let [_, command, subject] = args.as_slice()
        && command == "keeper-token"
    {
        let secret = config
            .keeper_jwt_secret
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("KEEPER_JWT_SECRET must be set to issue keeper tokens"))?;
        println!("{}", encode_jwt(subject, secret, config.keeper_jwt_expiry_hours)?);
        return Ok(());
    }

    tracing::info!("Starting Basket Lens API server...");
    let addr: SocketAddr = config
        .api_listen_addr
        .parse()
        .map_err(|_| anyhow::anyhow!("API_LISTEN_ADDR must be a socket address"))?;

    let source = ChainSource::from_config(&config)?;
    let state = AppState::new(Arc::new(source), config);

    // Build router
    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Received shutdown signal, stopping gracefully...");
        })
        .await?;

    tracing::info!("Basket Lens API server stopped.");
    Ok(())
}
