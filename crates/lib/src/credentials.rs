//! # Credential Resolver
//!
//! Reads the Google Ads API credentials from a secret store. The stored payload
//! is a JSON object holding the developer token, the OAuth client and refresh
//! token, and the login customer id. Two layouts are accepted:
//!
//! ```json
//! { "developer_token": "...", "client_id": "...", "client_secret": "...",
//!   "refresh_token": "...", "login_customer_id": "123-456-7890" }
//! ```
//!
//! or the same fields nested under `credentials`, optionally accompanied by a
//! `project_id` map giving a default customer per BigQuery project:
//!
//! ```json
//! { "credentials": { ... },
//!   "project_id": { "my-bq-project": { "customer_id": "9876543210" } } }
//! ```
//!
//! Payloads written with Python-style single quotes are tolerated.

use crate::{errors::UploadError, providers::secret_manager::SecretStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info};

/// Identifies one version of a secret in a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecretLocation {
    pub project_id: String,
    pub secret_id: String,
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "latest".to_string()
}

impl SecretLocation {
    pub fn new(project_id: impl Into<String>, secret_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            secret_id: secret_id.into(),
            version: default_version(),
        }
    }

    /// Pins a specific secret version instead of `latest`.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// The full resource name of the secret version.
    pub fn resource_name(&self) -> String {
        format!(
            "projects/{}/secrets/{}/versions/{}",
            self.project_id, self.secret_id, self.version
        )
    }
}

/// The raw bytes of a secret version as returned by the store.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretPayload {
    pub data: Vec<u8>,
    /// CRC32C of `data` reported by the store, when available.
    pub crc32c: Option<u32>,
}

impl fmt::Debug for SecretPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretPayload")
            .field("len", &self.data.len())
            .field("crc32c", &self.crc32c)
            .finish()
    }
}

/// Credentials for one invocation of the Google Ads API.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    pub developer_token: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    /// Manager account the API calls are made through, digits only.
    pub login_customer_id: String,
    /// Default customer that owns the conversion actions, digits only.
    pub customer_id: Option<String>,
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("client_id", &self.client_id)
            .field("login_customer_id", &self.login_customer_id)
            .field("customer_id", &self.customer_id)
            .finish_non_exhaustive()
    }
}

/// Strips the dashes the Google Ads UI puts in customer ids.
pub fn normalize_customer_id(raw: &str) -> String {
    raw.trim().chars().filter(|c| *c != '-').collect()
}

/// Fetches and parses the credential bundle from a [`SecretStore`].
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    location: SecretLocation,
}

impl CredentialResolver {
    pub fn new(location: SecretLocation) -> Self {
        Self { location }
    }

    pub fn location(&self) -> &SecretLocation {
        &self.location
    }

    /// Reads the secret once and turns it into a [`CredentialBundle`].
    ///
    /// `bigquery_project` selects the per-project default customer when the
    /// payload carries a `project_id` map.
    pub async fn resolve(
        &self,
        store: &dyn SecretStore,
        bigquery_project: &str,
    ) -> Result<CredentialBundle, UploadError> {
        let resource_name = self.location.resource_name();
        info!("Resolving Google Ads credentials from '{resource_name}'");

        let payload = store.access_secret_version(&resource_name).await?;
        verify_checksum(&payload)?;
        let bundle = parse_credentials(&payload.data, bigquery_project)?;

        debug!(?bundle, "Credentials resolved");
        Ok(bundle)
    }
}

/// Rejects payloads whose CRC32C does not match the one reported by the store.
pub fn verify_checksum(payload: &SecretPayload) -> Result<(), UploadError> {
    if let Some(expected) = payload.crc32c {
        let actual = crc32c::crc32c(&payload.data);
        if actual != expected {
            return Err(UploadError::SecretMalformed(format!(
                "data corruption detected (crc32c expected {expected}, got {actual})"
            )));
        }
    }
    Ok(())
}

/// Parses a stored payload into a [`CredentialBundle`].
pub fn parse_credentials(
    data: &[u8],
    bigquery_project: &str,
) -> Result<CredentialBundle, UploadError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| UploadError::SecretMalformed(format!("payload is not UTF-8: {e}")))?;

    let root: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(first_err) => serde_json::from_str(&text.replace('\'', "\"")).map_err(|_| {
            UploadError::SecretMalformed(format!("payload is not valid JSON: {first_err}"))
        })?,
    };

    if !root.is_object() {
        return Err(UploadError::SecretMalformed(
            "payload must be a JSON object".to_string(),
        ));
    }

    let fields = match root.get("credentials") {
        Some(nested) if nested.is_object() => nested,
        Some(_) => {
            return Err(UploadError::SecretMalformed(
                "`credentials` must be an object".to_string(),
            ))
        }
        None => &root,
    };

    let project_customer = root
        .get("project_id")
        .and_then(|projects| projects.get(bigquery_project))
        .and_then(|account| {
            scalar_string(account.get("customer_id"))
                .or_else(|| scalar_string(account.get("account_id")))
        });

    let customer_id = project_customer
        .or_else(|| scalar_string(fields.get("customer_id")))
        .map(|id| normalize_customer_id(&id));

    Ok(CredentialBundle {
        developer_token: required(fields, "developer_token")?,
        client_id: required(fields, "client_id")?,
        client_secret: required(fields, "client_secret")?,
        refresh_token: required(fields, "refresh_token")?,
        login_customer_id: normalize_customer_id(&required(fields, "login_customer_id")?),
        customer_id,
    })
}

fn required(fields: &Value, name: &str) -> Result<String, UploadError> {
    scalar_string(fields.get(name))
        .ok_or_else(|| UploadError::SecretMalformed(format!("missing or empty field `{name}`")))
}

// Customer ids are sometimes stored as JSON numbers.
fn scalar_string(value: Option<&Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}
