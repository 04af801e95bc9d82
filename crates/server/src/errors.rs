use ads_uploader::UploadError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// A custom error type for the server application.
///
/// Wraps pipeline failures so handlers can return them directly and have
/// them rendered as JSON error responses.
#[derive(Debug)]
pub enum AppError {
    /// Errors originating from the `ads_uploader` pipeline.
    Upload(UploadError),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        AppError::Upload(err)
    }
}

/// The HTTP status reported for each pipeline error.
pub fn status_for(err: &UploadError) -> StatusCode {
    match err {
        UploadError::SecretNotFound(_)
        | UploadError::SecretAccessDenied(_)
        | UploadError::SecretMalformed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        UploadError::SecretStoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        UploadError::InvalidRequest(_) | UploadError::QueryExecution(_) => StatusCode::BAD_REQUEST,
        UploadError::EmptyResult(_) => StatusCode::NOT_FOUND,
        UploadError::InvalidConversionRecord { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        UploadError::UploadEndpoint(_) => StatusCode::BAD_GATEWAY,
        UploadError::BigQueryClientBuild(_)
        | UploadError::ReqwestClientBuild(_)
        | UploadError::MissingProvider(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message, kind) = match self {
            AppError::Upload(err) => {
                error!("UploadError: {:?}", err);
                (status_for(&err), err.to_string(), err.kind())
            }
        };

        let body = Json(json!({
            "error": error_message,
            "kind": kind,
        }));

        (status_code, body).into_response()
    }
}
