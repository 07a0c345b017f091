//! HTTP server: router, startup and graceful shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use axum::Router;
use rfidhub_core::HubConfig;
use rfidhub_sip::SipClient;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{basic, ws};
use crate::state::ServerState;

/// Create the application router.
pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/api/health", get(basic::health_handler))
        .route("/api/stations", get(basic::stations_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve `state` on `listener` until `shutdown` resolves.
///
/// On shutdown every station is told to stop, which closes its UI socket so
/// the server can drain.
pub async fn serve<F>(listener: TcpListener, state: ServerState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let hub = state.hub.clone();
    let app = create_router(state);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown.await;
        tracing::info!(stations = hub.len(), "Shutting down, stopping stations");
        hub.stop_all();
    })
    .await?;

    Ok(())
}

/// Start the hub with the given configuration and run until Ctrl-C.
pub async fn run(config: HubConfig) -> anyhow::Result<()> {
    let bind = config.server.bind.clone();

    let client = SipClient::new(config.sip.clone());
    client.pool().open().await;
    let pool = client.pool().clone();

    let state = ServerState::new(config, Arc::new(client));

    let listener = TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    tracing::info!(bind = %bind, "rfidhub listening");

    serve(listener, state, shutdown_signal()).await?;

    pool.close();
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
