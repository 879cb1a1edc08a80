//! HTTP endpoint - `GET /temperature`

use crate::format::{to_json, to_named_json};
use crate::sensor::SensorReader;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

const READING_FAILED: &str = "couldn't take a reading";

#[derive(Debug, Clone)]
pub struct AppState {
    pub reader: SensorReader,
    pub sensor_name: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/temperature", get(get_temperature))
        .with_state(Arc::new(state))
}

async fn get_temperature(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match state.reader.acquire().await {
        Ok(reading) => {
            let body = match &state.sensor_name {
                Some(name) => to_named_json(name, &reading),
                None => to_json(&reading),
            };
            (StatusCode::OK, Json(body))
        }
        Err(e) => {
            tracing::error!("Failed to take a reading: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": READING_FAILED })),
            )
        }
    }
}

/// Serve until Ctrl-C or SIGTERM
pub async fn serve(state: AppState, bind: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Serving readings on http://{}/temperature", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
