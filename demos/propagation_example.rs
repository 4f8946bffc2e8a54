//! Example: How to propagate request IDs across handlers and log statements
//!
//! This example demonstrates how to correctly set up tracing subscriber so the
//! request_id attached by the middleware shows up in logs.
//!
//! Try it:
//!   curl http://localhost:3000/
//!   curl -H 'X-Request-ID: my-id-1' http://localhost:3000/
//!   curl -H 'X-Amzn-Trace-Id: Self=1-abc;Root=1-def' http://localhost:3000/trace

use axum::{routing::get, Router};
use request_id::{current_request_id, RequestId, RequestIdLayer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber - this is the key part
    // Must properly configure subscriber to see request_id in logs
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let app = Router::new()
        .route("/", get(handler))
        .route("/trace", get(trace_handler))
        .layer(RequestIdLayer::new());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();

    tracing::info!("Starting server on 0.0.0.0:3000");
    axum::serve(listener, app).await.unwrap();
}

async fn handler(request_id: RequestId) -> String {
    // These logs carry the request_id field because the middleware opened a span
    tracing::info!("Handling request");
    format!("Hello! Your request ID is: {request_id}")
}

async fn trace_handler() -> String {
    // No extractor in the signature: the ID is still reachable from anywhere
    // in the request's processing via the process-wide fetcher.
    let request_id = current_request_id()
        .map(|id| id.into_string())
        .unwrap_or_else(|| "unknown".to_string());

    tracing::info!("Resolved from ambient context");
    format!("Ambient request ID: {request_id}")
}
