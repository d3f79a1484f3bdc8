use crate::model::Channel;
use crate::render::{Dashboard, LineSeries};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone)]
struct AppState {
    dashboard: watch::Receiver<Arc<Dashboard>>,
}

pub fn create_router(dashboard: watch::Receiver<Arc<Dashboard>>) -> Router {
    let state = AppState { dashboard };

    Router::new()
        .route("/api/v1/series", get(get_dashboard))
        .route("/api/v1/series/:channel", get(get_series))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}

async fn get_dashboard(State(state): State<AppState>) -> Json<Dashboard> {
    let dashboard = state.dashboard.borrow().clone();
    Json(dashboard.as_ref().clone())
}

async fn get_series(
    State(state): State<AppState>,
    Path(channel): Path<String>,
) -> Result<Json<LineSeries>, AppError> {
    let channel: Channel = channel.parse().map_err(AppError::NotFound)?;
    let dashboard = state.dashboard.borrow().clone();

    dashboard
        .series(channel)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no series for {}", channel)))
}

enum AppError {
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotFound(message) => {
                debug!("API not found: {}", message);
                (StatusCode::NOT_FOUND, message).into_response()
            }
        }
    }
}
