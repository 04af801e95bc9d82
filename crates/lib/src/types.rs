use crate::{
    credentials::{CredentialResolver, SecretLocation},
    errors::UploadError,
    providers::{bigquery::RowSource, google_ads::GoogleAdsClient, secret_manager::SecretStore},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The column names every query result must carry, in select order.
pub const CONVERSION_COLUMNS: [&str; 9] = [
    "value",
    "date",
    "email",
    "phone",
    "order_id",
    "click_id",
    "gbraid",
    "wbraid",
    "conversion_action_id",
];

/// Source expressions selected for each conversion column.
///
/// Every field defaults to the column name itself, so a table whose columns are
/// already named after the contract needs no aliases at all.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ColumnAliases {
    pub value: String,
    pub date: String,
    pub email: String,
    pub phone: String,
    pub order_id: String,
    pub click_id: String,
    pub gbraid: String,
    pub wbraid: String,
    pub conversion_action_id: String,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            value: "value".to_string(),
            date: "date".to_string(),
            email: "email".to_string(),
            phone: "phone".to_string(),
            order_id: "order_id".to_string(),
            click_id: "click_id".to_string(),
            gbraid: "gbraid".to_string(),
            wbraid: "wbraid".to_string(),
            conversion_action_id: "conversion_action_id".to_string(),
        }
    }
}

impl ColumnAliases {
    /// Pairs each source expression with the contract column it is aliased to.
    pub fn pairs(&self) -> [(&str, &'static str); 9] {
        [
            (self.value.as_str(), CONVERSION_COLUMNS[0]),
            (self.date.as_str(), CONVERSION_COLUMNS[1]),
            (self.email.as_str(), CONVERSION_COLUMNS[2]),
            (self.phone.as_str(), CONVERSION_COLUMNS[3]),
            (self.order_id.as_str(), CONVERSION_COLUMNS[4]),
            (self.click_id.as_str(), CONVERSION_COLUMNS[5]),
            (self.gbraid.as_str(), CONVERSION_COLUMNS[6]),
            (self.wbraid.as_str(), CONVERSION_COLUMNS[7]),
            (self.conversion_action_id.as_str(), CONVERSION_COLUMNS[8]),
        ]
    }
}

/// Where the conversions are read from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryConfig {
    pub project_id: String,
    pub dataset_id: String,
    pub table_name: String,
    #[serde(default)]
    pub columns: ColumnAliases,
}

impl QueryConfig {
    pub fn new(
        project_id: impl Into<String>,
        dataset_id: impl Into<String>,
        table_name: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_name: table_name.into(),
            columns: ColumnAliases::default(),
        }
    }

    /// The fully qualified `project.dataset.table` path.
    pub fn table_path(&self) -> String {
        format!("{}.{}.{}", self.project_id, self.dataset_id, self.table_name)
    }

    /// Checks that every identifier and column expression is present.
    pub fn validate(&self) -> Result<(), UploadError> {
        for (name, value) in [
            ("project_id", &self.project_id),
            ("dataset_id", &self.dataset_id),
            ("table_name", &self.table_name),
        ] {
            if value.trim().is_empty() {
                return Err(UploadError::InvalidRequest(format!(
                    "`{name}` is required"
                )));
            }
        }
        for (expr, column) in self.columns.pairs() {
            if expr.trim().is_empty() {
                return Err(UploadError::InvalidRequest(format!(
                    "column expression for `{column}` must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// The body of an upload invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadRequest {
    #[serde(flatten)]
    pub query: QueryConfig,
    /// Customer owning the conversion actions. Falls back to the stored credentials.
    #[serde(default)]
    pub customer_id: Option<String>,
    /// ISO 4217 currency applied to every conversion value.
    #[serde(default)]
    pub currency_code: Option<String>,
    /// Ask Google Ads to validate the batch without recording it.
    #[serde(default)]
    pub validate_only: bool,
}

impl UploadRequest {
    pub fn new(query: QueryConfig) -> Self {
        Self {
            query,
            customer_id: None,
            currency_code: None,
            validate_only: false,
        }
    }
}

/// What Google Ads reported for an uploaded batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadOutcome {
    pub customer_id: String,
    pub rows_read: usize,
    pub conversions_submitted: usize,
    /// Per-conversion results exactly as returned by the API.
    pub results: Vec<Value>,
    /// The API's partial failure status, if any conversion was rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_failure_error: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Value>,
}

/// Runs the read-map-upload pipeline for one request at a time.
pub struct ConversionUploader {
    pub(crate) resolver: CredentialResolver,
    pub(crate) secret_store: Box<dyn SecretStore>,
    pub(crate) row_source: Box<dyn RowSource>,
    pub(crate) google_ads: GoogleAdsClient,
}

impl fmt::Debug for ConversionUploader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionUploader")
            .field("secret", &self.resolver.location().resource_name())
            .field("secret_store", &self.secret_store)
            .field("row_source", &self.row_source)
            .field("google_ads", &self.google_ads)
            .finish()
    }
}

/// A builder for creating `ConversionUploader` instances.
#[derive(Default)]
pub struct ConversionUploaderBuilder {
    secret_location: Option<SecretLocation>,
    secret_store: Option<Box<dyn SecretStore>>,
    row_source: Option<Box<dyn RowSource>>,
    google_ads: Option<GoogleAdsClient>,
}

impl ConversionUploaderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the secret holding the Google Ads credentials.
    pub fn secret_location(mut self, location: SecretLocation) -> Self {
        self.secret_location = Some(location);
        self
    }

    pub fn secret_store(mut self, store: Box<dyn SecretStore>) -> Self {
        self.secret_store = Some(store);
        self
    }

    pub fn row_source(mut self, source: Box<dyn RowSource>) -> Self {
        self.row_source = Some(source);
        self
    }

    pub fn google_ads(mut self, client: GoogleAdsClient) -> Self {
        self.google_ads = Some(client);
        self
    }

    /// Builds the `ConversionUploader`, failing if any collaborator is missing.
    pub fn build(self) -> Result<ConversionUploader, UploadError> {
        let location = self
            .secret_location
            .ok_or(UploadError::MissingProvider("secret location"))?;
        Ok(ConversionUploader {
            resolver: CredentialResolver::new(location),
            secret_store: self
                .secret_store
                .ok_or(UploadError::MissingProvider("secret store"))?,
            row_source: self
                .row_source
                .ok_or(UploadError::MissingProvider("row source"))?,
            google_ads: self
                .google_ads
                .ok_or(UploadError::MissingProvider("Google Ads"))?,
        })
    }
}
