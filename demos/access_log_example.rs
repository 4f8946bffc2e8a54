//! Example: Access logging and custom configuration
//!
//! Enables the per-request access log line and stores the ID under a custom
//! attribute name. The listener is wired with connect info so the access log
//! can print the caller's address.
//!
//! Try it:
//!   curl http://localhost:3000/
//!   curl -H 'X-Correlation-ID: corr-7' http://localhost:3000/
//!
//! Each request produces a line like:
//!   127.0.0.1 - - "GET / 200"

use axum::{routing::get, Router};
use request_id::{RequestId, RequestIdConfig, RequestIdLayer};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = RequestIdConfig {
        log_all_requests: true,
        attribute: "trace_id".to_string(),
        ..Default::default()
    };

    let app = Router::new()
        .route("/", get(handler))
        .layer(RequestIdLayer::with_config(config));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();

    tracing::info!("Starting server on 0.0.0.0:3000");
    // ConnectInfo is what fills in the remote address of the access log line
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}

async fn handler(request_id: RequestId) -> String {
    format!("Your request ID is: {request_id}")
}
