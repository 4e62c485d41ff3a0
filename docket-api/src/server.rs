//! API server setup

use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::router::create_router;
use crate::state::{AppState, ServerConfig};

/// Initialize tracing from `RUST_LOG` (`info` default).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Create the API server
pub fn create_server(
    config: &ServerConfig,
    state: AppState,
) -> Result<(Router, SocketAddr), Box<dyn std::error::Error + Send + Sync>> {
    let mut router = create_router(state);

    router = router.layer(TraceLayer::new_for_http());

    if config.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    Ok((router, addr))
}

/// Run the API server
pub async fn run_server(
    config: &ServerConfig,
    state: AppState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Background workers share the handler state.
    state.rate_limiter.spawn_cleanup();
    state.resync.clone().spawn_worker();

    let (router, addr) = create_server(config, state)?;

    tracing::info!("Docket API listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Start server in background (for testing)
pub async fn start_background_server(
    config: &ServerConfig,
    state: AppState,
) -> Result<SocketAddr, Box<dyn std::error::Error + Send + Sync>> {
    let (router, addr) = create_server(config, state)?;

    // Bind to get the actual address (useful when port is 0)
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
