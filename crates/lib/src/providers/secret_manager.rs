//! # Secret Manager Provider
//!
//! Reads secret versions through the Secret Manager v1 REST API. The access
//! token is either supplied up front or fetched from the compute metadata
//! server, which is what the function's runtime service account provides.

use crate::{credentials::SecretPayload, errors::UploadError};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use dyn_clone::DynClone;
use reqwest::{Client as ReqwestClient, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::fmt::{self, Debug};
use tracing::{debug, error};

pub const SECRET_MANAGER_URL: &str = "https://secretmanager.googleapis.com";

pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// A store of versioned secrets.
#[async_trait]
pub trait SecretStore: Send + Sync + DynClone + Debug {
    /// Reads the secret version named `projects/*/secrets/*/versions/*`.
    async fn access_secret_version(&self, resource_name: &str)
        -> Result<SecretPayload, UploadError>;
}

dyn_clone::clone_trait_object!(SecretStore);

/// Where the bearer token for Secret Manager comes from.
#[derive(Clone)]
pub enum TokenSource {
    /// A token obtained elsewhere, e.g. `gcloud auth print-access-token`.
    Static(String),
    /// The metadata server of the runtime environment.
    Metadata { url: String },
}

impl Default for TokenSource {
    fn default() -> Self {
        TokenSource::Metadata {
            url: METADATA_TOKEN_URL.to_string(),
        }
    }
}

impl Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenSource::Static(_) => f.write_str("Static(..)"),
            TokenSource::Metadata { url } => f.debug_struct("Metadata").field("url", url).finish(),
        }
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

impl TokenSource {
    async fn token(&self, client: &ReqwestClient) -> Result<String, UploadError> {
        let url = match self {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::Metadata { url } => url,
        };

        let response = client
            .get(url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| {
                UploadError::SecretStoreUnavailable(format!("metadata token request failed: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::SecretStoreUnavailable(format!(
                "metadata server returned {status}: {body}"
            )));
        }

        let token: MetadataToken = response.json().await.map_err(|e| {
            UploadError::SecretStoreUnavailable(format!("invalid metadata token response: {e}"))
        })?;
        Ok(token.access_token)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessSecretVersionResponse {
    payload: Option<RestPayload>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestPayload {
    #[serde(default)]
    data: String,
    // int64 fields are JSON strings in the REST mapping.
    #[serde(default)]
    data_crc32c: Option<Value>,
}

/// A [`SecretStore`] backed by Google Secret Manager.
#[derive(Clone, Debug)]
pub struct SecretManagerProvider {
    client: ReqwestClient,
    api_url: String,
    token_source: TokenSource,
}

impl SecretManagerProvider {
    pub fn new(api_url: impl Into<String>, token_source: TokenSource) -> Result<Self, UploadError> {
        let client = ReqwestClient::builder()
            .build()
            .map_err(UploadError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token_source,
        })
    }
}

#[async_trait]
impl SecretStore for SecretManagerProvider {
    async fn access_secret_version(
        &self,
        resource_name: &str,
    ) -> Result<SecretPayload, UploadError> {
        let token = self.token_source.token(&self.client).await?;
        let url = format!("{}/v1/{resource_name}:access", self.api_url);
        debug!("--> Accessing secret version '{resource_name}'");

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| UploadError::SecretStoreUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Secret Manager returned {status} for '{resource_name}'");
            return Err(match status {
                StatusCode::NOT_FOUND => {
                    UploadError::SecretNotFound(format!("{resource_name}: {body}"))
                }
                StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                    UploadError::SecretAccessDenied(format!("{resource_name}: {body}"))
                }
                _ => UploadError::SecretStoreUnavailable(format!("{status}: {body}")),
            });
        }

        let body: AccessSecretVersionResponse = response.json().await.map_err(|e| {
            UploadError::SecretMalformed(format!("unexpected Secret Manager response: {e}"))
        })?;
        let payload = body.payload.ok_or_else(|| {
            UploadError::SecretMalformed(format!("secret version '{resource_name}' has no payload"))
        })?;

        let data = STANDARD
            .decode(payload.data.as_bytes())
            .map_err(|e| UploadError::SecretMalformed(format!("payload is not base64: {e}")))?;
        let crc32c = payload.data_crc32c.as_ref().and_then(parse_crc32c);

        Ok(SecretPayload { data, crc32c })
    }
}

fn parse_crc32c(value: &Value) -> Option<u32> {
    match value {
        Value::String(s) => s.parse::<u32>().ok(),
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        _ => None,
    }
}
