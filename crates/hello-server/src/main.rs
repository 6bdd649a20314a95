// Greeting server
// Decision: One route only; it exists to give the pool executor a real HTTP target

use anyhow::{Context, Result};
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line options
#[derive(Debug, Parser)]
#[command(name = "hello-server", version, about = "Single-route greeting server")]
struct Args {
    /// Run in debug mode (debug logging and request tracing)
    #[arg(long)]
    debug: bool,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // Initialize tracing
    let default_filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut app = hello_server::router();
    if args.debug {
        app = app.layer(TraceLayer::new_for_http());
    }

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, debug = args.debug, "hello-server listening");
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
