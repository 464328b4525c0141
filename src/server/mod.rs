//! HTTP surface.
//!
//! `POST /api/chat` answers with a JSON body or an NDJSON stream depending
//! on the request's `stream` flag; `GET /health` is a liveness probe.

pub mod error;

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub use error::{ApiError, ErrorBody};

use crate::chat::{ChatReply, InboundRequest, Orchestrator};

/// Content type of streamed responses.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    shutdown: CancellationToken,
}

impl AppState {
    /// Creates state; cancelling `shutdown` cancels in-flight streams.
    #[must_use]
    pub const fn new(orchestrator: Arc<Orchestrator>, shutdown: CancellationToken) -> Self {
        Self {
            orchestrator,
            shutdown,
        }
    }
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

async fn chat(
    State(state): State<AppState>,
    Json(request): Json<InboundRequest>,
) -> Result<Response, ApiError> {
    let reply = state
        .orchestrator
        .respond(request, state.shutdown.child_token())
        .await?;

    Ok(match reply {
        ChatReply::Complete(body) => (StatusCode::OK, Json(body)).into_response(),
        ChatReply::Stream(events) => {
            // Dropping the body (client disconnect) drops the receiver,
            // which stops the producing task.
            let lines = events.map(|event| Ok::<_, Infallible>(event.to_ndjson()));
            (
                [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
                Body::from_stream(lines),
            )
                .into_response()
        }
    })
}

/// Serves the API on `host:port` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(orchestrator: Arc<Orchestrator>, host: &str, port: u16) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let app = router(AppState::new(orchestrator, shutdown.clone()));

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "ragline listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
