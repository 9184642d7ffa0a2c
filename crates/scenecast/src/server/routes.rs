use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::info;

use super::AppState;
use crate::Result;

pub async fn health() -> &'static str {
    "OK"
}

pub async fn metrics() -> Result<String> {
    crate::metrics::gather_metrics()
}

pub async fn start_run(State(state): State<Arc<AppState>>) -> Result<Response> {
    let fired = state.orchestrator.start().await?;
    let snapshot = state.orchestrator.snapshot();

    if fired {
        info!("Run started on orchestrator {}", snapshot.id);
        Ok((StatusCode::ACCEPTED, Json(snapshot.to_json(false))).into_response())
    } else {
        Ok((
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": format!("Cannot start a run while {}", snapshot.state),
                "state": snapshot.state,
            })),
        )
            .into_response())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SnapshotQuery {
    #[serde(default)]
    artifacts: bool,
}

pub async fn current_run(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SnapshotQuery>,
) -> Json<serde_json::Value> {
    Json(state.orchestrator.snapshot().to_json(query.artifacts))
}

pub async fn current_artifact(
    State(state): State<Arc<AppState>>,
    Path(index): Path<usize>,
) -> Response {
    let snapshot = state.orchestrator.snapshot();
    match snapshot.context.generated_artifacts.get(index) {
        Some(artifact) => (
            [(header::CONTENT_TYPE, "image/png")],
            artifact.data.clone(),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("No artifact at index {}", index) })),
        )
            .into_response(),
    }
}
