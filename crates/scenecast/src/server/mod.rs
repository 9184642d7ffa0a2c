mod routes;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{workflow::OrchestratorHandle, Error, Result};

pub struct AppState {
    pub orchestrator: OrchestratorHandle,
}

pub struct Server {
    orchestrator: OrchestratorHandle,
}

impl Server {
    pub fn new(orchestrator: OrchestratorHandle) -> Self {
        Self { orchestrator }
    }

    pub fn build_router(self) -> Router {
        let state = Arc::new(AppState {
            orchestrator: self.orchestrator,
        });

        Router::new()
            .route("/health", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .route("/runs", post(routes::start_run))
            .route("/runs/current", get(routes::current_run))
            .route(
                "/runs/current/artifacts/{index}",
                get(routes::current_artifact),
            )
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
            .with_state(state)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::UpstreamFetch(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}
