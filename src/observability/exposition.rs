//! Prometheus scrape endpoint.
//!
//! A small axum application serving the accumulated instrument state in the
//! text exposition format, mounted on its own address alongside the proxy.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::net::TcpListener;

use crate::instruments::InstrumentRegistry;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4";

/// Build the scrape application.
pub fn metrics_app(instruments: Arc<InstrumentRegistry>) -> Router {
    Router::new()
        .route("/metrics", get(scrape_handler))
        .with_state(instruments)
}

/// Serve the scrape application on the given listener.
pub async fn serve(
    listener: TcpListener,
    instruments: Arc<InstrumentRegistry>,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Metrics endpoint starting");
    axum::serve(listener, metrics_app(instruments)).await
}

async fn scrape_handler(State(instruments): State<Arc<InstrumentRegistry>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, TEXT_FORMAT)],
        instruments.encode_text(),
    )
}
