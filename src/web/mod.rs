mod error;
mod handlers;
mod routes;
pub mod security;
mod state;

pub use handlers::upload::UPLOAD_FIELD;
pub use state::{load_templates, AppState};

use crate::Config;
use anyhow::{Context, Result};
use axum::middleware;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Assembles the full application around `state`.
pub fn router(state: Arc<AppState>) -> Result<Router> {
    let max_request = state.config.media.max_request_bytes()?;
    let max_request = usize::try_from(max_request).unwrap_or(usize::MAX);

    let app = Router::new()
        .merge(routes::page_routes())
        .merge(routes::upload_routes(max_request))
        .merge(routes::media_routes(state.store.upload_dir()))
        .layer(middleware::from_fn(security::apply_security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    Ok(app)
}

pub async fn serve(config: Config, addr: &str) -> Result<()> {
    let state = Arc::new(AppState::new(config)?);

    state.store.ensure_dir().await.with_context(|| {
        format!(
            "Could not create upload directory {:?}",
            state.store.upload_dir()
        )
    })?;

    let app = router(state)?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Could not listen on {}", addr))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
