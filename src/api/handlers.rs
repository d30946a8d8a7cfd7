//! HTTP API handlers.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::pipeline::{PipelineStats, SharedStats};

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Whether the stage loops are running.
    pub ready: Arc<std::sync::atomic::AtomicBool>,
    /// This worker's lease identity.
    pub worker: Arc<str>,
    /// Pipeline totals.
    pub stats: SharedStats,
}

impl AppState {
    /// Create new app state.
    pub fn new(worker: impl Into<Arc<str>>) -> Self {
        Self::with_stats(worker, SharedStats::default())
    }

    /// Create app state over existing stats.
    pub fn with_stats(worker: impl Into<Arc<str>>, stats: SharedStats) -> Self {
        Self {
            ready: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            worker: worker.into(),
            stats,
        }
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready
            .store(ready, std::sync::atomic::Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether the loops are running.
    pub ready: bool,
    /// Worker identity.
    pub worker: String,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Worker identity.
    pub worker: String,
    /// Pipeline totals.
    pub stats: PipelineStats,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();

    let response = ReadyResponse {
        ready: is_ready,
        worker: state.worker.to_string(),
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns loop state and pipeline totals.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.stats.read().await.clone();
    let status = if state.is_ready() { "running" } else { "starting" };

    Json(StatusResponse {
        status,
        worker: state.worker.to_string(),
        stats,
    })
}
