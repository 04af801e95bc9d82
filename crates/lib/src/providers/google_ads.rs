use crate::{
    credentials::CredentialBundle,
    errors::UploadError,
    record::{ConversionIdentifier, ConversionRecord},
};
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

/// Google Ads accepts at most this many conversions in one upload request.
pub const MAX_CONVERSIONS_PER_UPLOAD: usize = 2000;

pub const GOOGLE_ADS_API_URL: &str = "https://googleads.googleapis.com";
pub const GOOGLE_ADS_API_VERSION: &str = "v20";
pub const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Endpoints used to talk to Google Ads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoogleAdsConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_api_url() -> String {
    GOOGLE_ADS_API_URL.to_string()
}

fn default_api_version() -> String {
    GOOGLE_ADS_API_VERSION.to_string()
}

fn default_token_url() -> String {
    OAUTH_TOKEN_URL.to_string()
}

impl Default for GoogleAdsConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_version: default_api_version(),
            token_url: default_token_url(),
        }
    }
}

// --- Google Ads REST request and response structures ---

#[derive(Serialize)]
struct RefreshTokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadClickConversionsRequest {
    pub(crate) conversions: Vec<ClickConversion>,
    pub(crate) partial_failure: bool,
    pub(crate) validate_only: bool,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ClickConversion {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) gclid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) gbraid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) wbraid: Option<String>,
    pub(crate) conversion_action: String,
    pub(crate) conversion_date_time: String,
    pub(crate) conversion_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) currency_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) order_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) user_identifiers: Vec<UserIdentifier>,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) enum UserIdentifier {
    HashedEmail(String),
    HashedPhoneNumber(String),
}

/// The body of a successful `uploadClickConversions` call.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UploadClickConversionsResponse {
    #[serde(default)]
    pub partial_failure_error: Option<Value>,
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub job_id: Option<Value>,
}

impl ClickConversion {
    pub(crate) fn from_record(
        record: &ConversionRecord,
        customer_id: &str,
        currency_code: Option<&str>,
    ) -> Self {
        let (gclid, gbraid, wbraid) = match &record.identifier {
            ConversionIdentifier::ClickId(id) => (Some(id.clone()), None, None),
            ConversionIdentifier::Gbraid(id) => (None, Some(id.clone()), None),
            ConversionIdentifier::Wbraid(id) => (None, None, Some(id.clone())),
        };

        let mut user_identifiers = Vec::new();
        if let Some(email) = &record.hashed_email {
            user_identifiers.push(UserIdentifier::HashedEmail(email.clone()));
        }
        if let Some(phone) = &record.hashed_phone {
            user_identifiers.push(UserIdentifier::HashedPhoneNumber(phone.clone()));
        }

        Self {
            gclid,
            gbraid,
            wbraid,
            conversion_action: format!(
                "customers/{customer_id}/conversionActions/{}",
                record.conversion_action_id
            ),
            conversion_date_time: record.date.clone(),
            conversion_value: record.value,
            currency_code: currency_code.map(str::to_string),
            order_id: record.order_id.clone(),
            user_identifiers,
        }
    }
}

/// A client for the Google Ads conversion upload service.
#[derive(Clone, Debug)]
pub struct GoogleAdsClient {
    client: ReqwestClient,
    config: GoogleAdsConfig,
}

impl GoogleAdsClient {
    pub fn new(config: GoogleAdsConfig) -> Result<Self, UploadError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(UploadError::ReqwestClientBuild)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GoogleAdsConfig {
        &self.config
    }

    /// Exchanges the stored refresh token for a short-lived access token.
    pub async fn refresh_access_token(
        &self,
        credentials: &CredentialBundle,
    ) -> Result<String, UploadError> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&RefreshTokenRequest {
                grant_type: "refresh_token",
                client_id: &credentials.client_id,
                client_secret: &credentials.client_secret,
                refresh_token: &credentials.refresh_token,
            })
            .send()
            .await
            .map_err(|e| UploadError::UploadEndpoint(format!("OAuth token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("OAuth token endpoint returned {status}");
            return Err(UploadError::UploadEndpoint(format!(
                "OAuth token refresh returned {status}: {error_text}"
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            UploadError::UploadEndpoint(format!("invalid OAuth token response: {e}"))
        })?;
        Ok(token.access_token)
    }

    /// Uploads the whole batch in a single call with partial failure enabled.
    ///
    /// Rejections of individual conversions come back in
    /// `partial_failure_error` and are not treated as an error here.
    pub async fn upload_click_conversions(
        &self,
        credentials: &CredentialBundle,
        access_token: &str,
        customer_id: &str,
        records: &[ConversionRecord],
        currency_code: Option<&str>,
        validate_only: bool,
    ) -> Result<UploadClickConversionsResponse, UploadError> {
        let url = format!(
            "{}/{}/customers/{customer_id}:uploadClickConversions",
            self.config.api_url.trim_end_matches('/'),
            self.config.api_version
        );
        let request_body = UploadClickConversionsRequest {
            conversions: records
                .iter()
                .map(|record| ClickConversion::from_record(record, customer_id, currency_code))
                .collect(),
            partial_failure: true,
            validate_only,
        };

        info!(
            "--> Uploading {} click conversions for customer {customer_id}",
            request_body.conversions.len()
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .header("developer-token", &credentials.developer_token)
            .header("login-customer-id", &credentials.login_customer_id)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| UploadError::UploadEndpoint(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Google Ads API returned {status}: {error_text}");
            return Err(UploadError::UploadEndpoint(format!("{status}: {error_text}")));
        }

        let upload_response: UploadClickConversionsResponse = response.json().await.map_err(|e| {
            UploadError::UploadEndpoint(format!("invalid upload response: {e}"))
        })?;

        info!(
            "<-- Google Ads accepted the batch ({} results, partial failure: {})",
            upload_response.results.len(),
            upload_response.partial_failure_error.is_some()
        );
        Ok(upload_response)
    }
}
