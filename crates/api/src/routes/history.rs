//! Diagnostics Routes

use axum::{
    extract::{Path, Query, State},
    Json,
};
use hub::{HistoryClass, SubscriberInfo};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::{ApiError, AppState};

/// Query parameters for history endpoint
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Maximum number of records to return
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

/// Response for history endpoint
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub class: HistoryClass,
    pub count: usize,
    /// Most recent first
    pub data: Vec<Value>,
}

/// Snapshot of a history buffer
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(class): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let class: HistoryClass = class.parse()?;
    let data: Vec<Value> = state
        .hub
        .recent(class, params.limit)
        .iter()
        .map(|delivery| Value::Object(delivery.event.as_map().clone()))
        .collect();

    Ok(Json(HistoryResponse {
        class,
        count: data.len(),
        data,
    }))
}

/// Live subscribers
pub async fn get_subscribers(State(state): State<Arc<AppState>>) -> Json<Vec<SubscriberInfo>> {
    Json(state.hub.subscribers())
}
