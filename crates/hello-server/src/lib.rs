//! Greeting endpoint
//!
//! A single route, `GET /{name}`, answering `Hello, {name}`. The name is the
//! whole remaining path, slashes included. Used as a network-shaped target for
//! the pool executor's tests and benchmarks.

use axum::{extract::Path, routing::get, Router};

/// Build the greeting router
pub fn router() -> Router {
    Router::new()
        .route("/", get(greet_nobody))
        .route("/*name", get(greet))
}

async fn greet(Path(name): Path<String>) -> String {
    format!("Hello, {name}")
}

async fn greet_nobody() -> &'static str {
    "Hello, "
}
