//! Ingest Route

use axum::{body::Bytes, extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::{ApiError, AppState};

/// Response for `POST /data`
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub message: &'static str,
    /// `accepted` or `suspect`
    pub validation: &'static str,
}

/// Accept one event from the car node
pub async fn post_data(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<IngestResponse>, ApiError> {
    let delivery = state.hub.ingest_json(&body)?;
    Ok(Json(IngestResponse {
        status: "success",
        message: "Data received",
        validation: delivery.validation.label(),
    }))
}
