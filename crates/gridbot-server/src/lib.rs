pub mod auth;
pub mod error;
pub mod routes;
pub mod state;
pub mod worker;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::worker::Driver;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let auth = Arc::new(AuthConfig {
        token: app_state.config.server.api_token.clone(),
    });

    Router::new()
        .route("/command", post(routes::commands::submit_command))
        .route("/commands/{id}", get(routes::commands::get_command))
        .route("/status", get(routes::status::get_status))
        .layer(middleware::from_fn_with_state(auth, auth::bearer_auth))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// A driver for the parse and process jobs sharing the server's store.
pub fn driver_for(app_state: &state::AppState) -> Driver {
    Driver::new(
        app_state.db.clone(),
        app_state.config.robot.clone(),
        app_state.config.worker.interval(),
    )
}

/// Serve the API on a pre-bound listener.
///
/// Accepts a `TcpListener` that was already bound so the caller can read
/// the actual port before starting (useful when `port = 0`). With
/// `with_worker` the periodic driver runs in the same process.
pub async fn serve_on(
    app_state: state::AppState,
    listener: tokio::net::TcpListener,
    with_worker: bool,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();

    if app_state.config.server.api_token.is_none() {
        tracing::warn!("no API token configured; requests are not authenticated");
    }

    let worker = with_worker.then(|| tokio::spawn(driver_for(&app_state).run()));

    let app = build_router(app_state);
    tracing::info!("gridbot API listening on http://localhost:{actual_port}");

    let result = axum::serve(listener, app).await;
    if let Some(handle) = worker {
        handle.abort();
    }
    result?;
    Ok(())
}
