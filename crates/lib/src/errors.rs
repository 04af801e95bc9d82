use thiserror::Error;

/// Errors produced while resolving credentials, reading rows and uploading conversions.
///
/// None of these are retried internally; each one is surfaced to the caller with
/// whatever detail the failing collaborator reported.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Secret not found: {0}")]
    SecretNotFound(String),
    #[error("Access to secret denied: {0}")]
    SecretAccessDenied(String),
    #[error("Secret payload is malformed: {0}")]
    SecretMalformed(String),
    #[error("Secret store request failed: {0}")]
    SecretStoreUnavailable(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("BigQuery query execution failed: {0}")]
    QueryExecution(String),
    #[error("The query returned no rows from `{0}`")]
    EmptyResult(String),
    #[error("Invalid conversion record at row {row}: {reason}")]
    InvalidConversionRecord { row: usize, reason: String },
    #[error("Google Ads API request failed: {0}")]
    UploadEndpoint(String),
    #[error("Failed to authenticate BigQuery client: {0}")]
    BigQueryClientBuild(String),
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Uploader is missing its {0}")]
    MissingProvider(&'static str),
}

impl UploadError {
    /// A stable name for the error, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::SecretNotFound(_) => "SecretNotFound",
            UploadError::SecretAccessDenied(_) => "SecretAccessDenied",
            UploadError::SecretMalformed(_) => "SecretMalformed",
            UploadError::SecretStoreUnavailable(_) => "SecretStoreUnavailable",
            UploadError::InvalidRequest(_) => "InvalidRequest",
            UploadError::QueryExecution(_) => "QueryExecutionError",
            UploadError::EmptyResult(_) => "EmptyResult",
            UploadError::InvalidConversionRecord { .. } => "InvalidConversionRecord",
            UploadError::UploadEndpoint(_) => "UploadEndpointError",
            UploadError::BigQueryClientBuild(_)
            | UploadError::ReqwestClientBuild(_)
            | UploadError::MissingProvider(_) => "Internal",
        }
    }
}
