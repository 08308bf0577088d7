//! Connectivity Smoke Test

use axum::{body::Bytes, Json};
use serde_json::{json, Value};

use crate::ApiError;

/// Return the JSON body unchanged
pub async fn echo(body: Bytes) -> Result<Json<Value>, ApiError> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;
    Ok(Json(json!({ "status": "success", "echo": value })))
}
