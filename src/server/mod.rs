//! HTTP query surface for the rendering client.
//!
//! Thin wrappers over [`QueryEngine`]: parameter parsing and error
//! mapping live here, all aggregation semantics live in the engine.

mod api;

pub use api::ApiError;

use anyhow::Result;
use axum::{Router, routing::get};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::query::QueryEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: QueryEngine,
}

pub fn router(engine: QueryEngine) -> Router {
    Router::new()
        .route("/healthz", get(api::healthz))
        .route("/api/tree", get(api::tree))
        .route("/api/contributors", get(api::contributors))
        .route("/api/timeline", get(api::timeline))
        .route("/api/metadata", get(api::metadata))
        .route("/api/file/{id}", get(api::file_detail))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { engine })
}

pub async fn serve(engine: QueryEngine, addr: &str) -> Result<()> {
    let app = router(engine);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("repovis listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
