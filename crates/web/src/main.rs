use anyhow::Context;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use analysis_board_core::ProcessTransport;

mod board;
mod config;
mod error;
mod routes;

pub struct AppState {
    pub board: board::BoardHandle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = config::Config::from_env();

    let engine_path = config.engine_path.clone();
    tracing::info!("Starting engine: {engine_path}");
    let (board, board_task) = board::spawn(config.session, move |lines| {
        ProcessTransport::spawn(&engine_path, move |line| lines.push(line))
    });

    let state = Arc::new(AppState {
        board: board.clone(),
    });
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("Server running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    board.shutdown().await;
    board_task.await.context("Board task panicked")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for ctrl-c: {e}");
    }
    tracing::info!("Shutting down");
}
