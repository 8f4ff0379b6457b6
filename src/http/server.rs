//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with a catch-all proxy handler
//! - Wire up middleware (request ID, tracing, body limit)
//! - Run the interceptor, then the forwarding engine, for every request
//! - Serve on a listener with graceful shutdown

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware,
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::config::ProxyConfig;
use crate::error::{ProxyResult, StartupError};
use crate::forward::client::build_client;
use crate::forward::{ForwardingEngine, UpstreamTarget};
use crate::http::request::{assign_request_id, RequestIdExt};
use crate::http::response::error_response;
use crate::intercept::{sink, Interceptor, LogSink};
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub interceptor: Interceptor,
    pub engine: ForwardingEngine,
}

/// HTTP server for the proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a server whose request log sink comes from configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, StartupError> {
        let sink = sink::from_config(&config.observability);
        Self::with_sink(config, sink)
    }

    /// Create a server that hands request log records to `sink`.
    pub fn with_sink(config: ProxyConfig, sink: Arc<dyn LogSink>) -> Result<Self, StartupError> {
        let target = Arc::new(UpstreamTarget::parse(&config.upstream.url)?);
        let client = build_client(config.timeouts.connect())?;

        let state = AppState {
            interceptor: Interceptor::new(
                sink,
                config.limits.max_body_bytes,
                config.limits.buffer_all_bodies,
            ),
            engine: ForwardingEngine::new(
                client,
                target,
                config.timeouts.request(),
                config.limits.max_body_bytes,
            ),
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            // Every method and path is relayed.
            .fallback(proxy_handler)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .request_id()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                tracing::info_span!(
                    "request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }))
            .layer(middleware::from_fn(assign_request_id))
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.url,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router, for embedding or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

/// Main proxy handler: parse and log, then relay.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let response = match relay(&state, request).await {
        Ok(response) => response,
        Err(err) => error_response(err),
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

async fn relay(state: &AppState, request: Request<Body>) -> ProxyResult<Response> {
    let intercepted = state.interceptor.intercept(request).await?;
    state.engine.forward(intercepted).await
}
