//! # Ads Uploader
//!
//! Reads click conversions from a BigQuery table and uploads them to the
//! Google Ads API. Each invocation resolves its credentials from a secret
//! store, runs one query, maps the rows and sends one upload request.

pub mod credentials;
pub mod errors;
pub mod hashing;
pub mod providers;
pub mod query;
pub mod record;
pub mod types;

pub use credentials::{CredentialBundle, CredentialResolver, SecretLocation, SecretPayload};
pub use errors::UploadError;
pub use record::{ConversionIdentifier, ConversionRecord};
pub use types::{
    ColumnAliases, ConversionUploader, ConversionUploaderBuilder, QueryConfig, UploadOutcome,
    UploadRequest,
};

use crate::{
    credentials::normalize_customer_id, providers::google_ads::MAX_CONVERSIONS_PER_UPLOAD,
    query::build_query, record::map_rows,
};
use tracing::{error, info};

impl ConversionUploader {
    /// Runs the full pipeline for one request.
    ///
    /// The steps stop at the first failure: credentials, query, row mapping,
    /// token refresh, upload. Nothing is retried, and no upload is attempted
    /// unless every row maps to a valid conversion.
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadOutcome, UploadError> {
        request.query.validate()?;
        let table = request.query.table_path();
        info!("[upload] Starting conversion upload from `{table}`");

        let credentials = self
            .resolver
            .resolve(self.secret_store.as_ref(), &request.query.project_id)
            .await?;

        let customer_id = request
            .customer_id
            .as_deref()
            .map(normalize_customer_id)
            .filter(|id| !id.is_empty())
            .or_else(|| credentials.customer_id.clone())
            .unwrap_or_else(|| credentials.login_customer_id.clone());

        let sql = build_query(&request.query);
        let rows = self
            .row_source
            .fetch_rows(&request.query.project_id, &sql)
            .await
            .inspect_err(|e| error!("[upload] Query execution error: {e}"))?;

        if rows.is_empty() {
            return Err(UploadError::EmptyResult(table));
        }
        if rows.len() > MAX_CONVERSIONS_PER_UPLOAD {
            return Err(UploadError::InvalidRequest(format!(
                "`{table}` holds more than {MAX_CONVERSIONS_PER_UPLOAD} conversions; \
                 at most {MAX_CONVERSIONS_PER_UPLOAD} can be uploaded per request"
            )));
        }

        let records = map_rows(&rows).inspect_err(|e| error!("[upload] {e}"))?;
        info!(
            "[upload] Mapped {} rows into conversions for customer {customer_id}",
            records.len()
        );

        let access_token = self.google_ads.refresh_access_token(&credentials).await?;
        let response = self
            .google_ads
            .upload_click_conversions(
                &credentials,
                &access_token,
                &customer_id,
                &records,
                request.currency_code.as_deref(),
                request.validate_only,
            )
            .await?;

        Ok(UploadOutcome {
            customer_id,
            rows_read: rows.len(),
            conversions_submitted: records.len(),
            results: response.results,
            partial_failure_error: response.partial_failure_error,
            job_id: response.job_id,
        })
    }
}
