//! Sidecar proxy server.
//!
//! # Responsibilities
//! - Buffer request bodies losslessly before the upstream sees them
//! - Run REQUEST-phase recording, save context labels per request id
//! - Forward the request unchanged to the configured upstream
//! - Buffer the response, run RESPONSE-phase recording, return it unchanged
//!
//! # Design Decisions
//! - Instrumentation failures are invisible to the client: the proxied
//!   request/response flow never blocks or fails on the metrics path
//! - Response metrics are recorded for successful (2xx) responses only
//! - The correlator entry is consumed on every exit path so concurrent
//!   requests cannot observe each other's context labels

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{
        uri::{Authority, Scheme},
        Request, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::config::schema::AgentConfig;
use crate::correlate::ContextCorrelator;
use crate::instruments::{record_request_metrics, record_response_metrics, InstrumentRegistry};

/// Application state injected into the proxy handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AgentConfig>,
    pub instruments: Arc<InstrumentRegistry>,
    pub correlator: Arc<ContextCorrelator>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the metric sidecar.
pub struct SidecarServer {
    router: Router,
}

impl SidecarServer {
    /// Create a new sidecar server with the given configuration and
    /// pre-built instrument registry.
    pub fn new(config: AgentConfig, instruments: Arc<InstrumentRegistry>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            config: Arc::new(config),
            instruments,
            correlator: Arc::new(ContextCorrelator::default()),
            client,
        };

        let router = Self::build_router(state);
        Self { router }
    }

    /// Build the axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let request_timeout = Duration::from_secs(state.config.listener.request_timeout_secs);
        Router::new()
            .route("/{*path}", any(sidecar_handler))
            .route("/", any(sidecar_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Sidecar proxy starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Sidecar proxy stopped");
        Ok(())
    }
}

/// Main proxy handler: record request metrics, forward, record response
/// metrics, return the response unchanged.
async fn sidecar_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = Uuid::new_v4();
    let max_body_size = state.config.listener.max_body_size;

    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, max_body_size).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!(request_id = %request_id, error = %error, "Failed to buffer request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        path = %parts.uri.path(),
        body_len = body_bytes.len(),
        "Proxying request"
    );

    state.correlator.begin(request_id);
    let context = record_request_metrics(&state.config.rules, &state.instruments, &body_bytes);
    state.correlator.save(request_id, context);

    // Rewrite the URI toward the upstream, keeping path and query.
    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    match Authority::from_str(&state.config.upstream.address) {
        Ok(authority) => uri_parts.authority = Some(authority),
        Err(error) => {
            tracing::error!(error = %error, "Invalid upstream address");
            state.correlator.take(&request_id);
            return (StatusCode::BAD_GATEWAY, "Invalid upstream address").into_response();
        }
    }
    let uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(error) => {
            tracing::error!(request_id = %request_id, error = %error, "Failed to build upstream URI");
            state.correlator.take(&request_id);
            return (StatusCode::BAD_GATEWAY, "Failed to build upstream URI").into_response();
        }
    };

    let mut builder = Request::builder().method(parts.method.clone()).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        for (key, value) in parts.headers.iter() {
            headers.insert(key.clone(), value.clone());
        }
    }
    let upstream_request = match builder.body(Body::from(body_bytes)) {
        Ok(request) => request,
        Err(error) => {
            tracing::error!(request_id = %request_id, error = %error, "Failed to build upstream request");
            state.correlator.take(&request_id);
            return (StatusCode::BAD_GATEWAY, "Failed to build upstream request").into_response();
        }
    };

    match state.client.request(upstream_request).await {
        Ok(response) => {
            let status = response.status();
            let (response_parts, response_body) = response.into_parts();
            let response_bytes =
                match axum::body::to_bytes(Body::new(response_body), max_body_size).await {
                    Ok(bytes) => bytes,
                    Err(error) => {
                        tracing::warn!(request_id = %request_id, error = %error, "Failed to buffer response body");
                        state.correlator.take(&request_id);
                        return (StatusCode::BAD_GATEWAY, "Failed to read upstream response")
                            .into_response();
                    }
                };

            let context = state.correlator.take(&request_id);
            if status.is_success() {
                record_response_metrics(
                    &state.config.rules,
                    &state.instruments,
                    &response_bytes,
                    &context,
                );
            }

            Response::from_parts(response_parts, Body::from(response_bytes))
        }
        Err(error) => {
            tracing::error!(request_id = %request_id, error = %error, "Upstream request failed");
            state.correlator.take(&request_id);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received");
}
