//! HTTP entry point for the Resonate identification service.
//!
//! Wires the shared catalog, scoring configuration and extractor into an
//! axum router and serves it.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::CorsOrigins;
use crate::errors::Result;
use crate::fingerprint::extraction::Extractor;
use crate::matching::Identifier;
use crate::persistance::Catalog;
use crate::routes;

/// Upload ceiling for `/identify`.
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub identifier: Arc<Identifier<dyn Catalog>>,
    pub extractor: Arc<dyn Extractor>,
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match origins {
        CorsOrigins::Any => layer.allow_origin(Any),
        CorsOrigins::List(list) => layer.allow_origin(list.clone()),
    }
}

pub fn router(state: AppState, cors: &CorsOrigins) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/stats", get(routes::stats))
        .route("/identify", post(routes::identify))
        .route("/identify/fingerprint", post(routes::identify_fingerprint))
        .layer(axum::extract::DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors_layer(cors))
        .with_state(state)
}

pub async fn serve(bind_addr: &str, state: AppState, cors: &CorsOrigins) -> Result<()> {
    let listener = TcpListener::bind(bind_addr).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(state, cors)).await?;
    Ok(())
}
