//! # Upload Handler
//!
//! Triggers one read-map-upload run per request. The body names the source
//! table and, optionally, the customer, currency and validate-only flag.

use super::{AppError, AppState};
use ads_uploader::{UploadError, UploadOutcome, UploadRequest};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::Value;
use tracing::info;

/// The handler for `POST /`.
pub async fn upload_handler(
    State(app_state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UploadOutcome>, AppError> {
    let Json(payload) = payload.map_err(|e| UploadError::InvalidRequest(e.body_text()))?;
    let request: UploadRequest = serde_json::from_value(payload)
        .map_err(|e| UploadError::InvalidRequest(e.to_string()))?;
    info!(
        "Received upload request for table `{}`",
        request.query.table_path()
    );

    let outcome = app_state.uploader.upload(request).await?;

    info!(
        "Uploaded {} conversions for customer {}",
        outcome.conversions_submitted, outcome.customer_id
    );
    Ok(Json(outcome))
}
