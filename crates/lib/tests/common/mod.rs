#![allow(dead_code)]
//! # Common Test Utilities
//!
//! In-memory stand-ins for the secret store and the row source, plus helpers
//! for building uploaders that talk to a `wiremock` server instead of Google.

use ads_uploader::{
    providers::{
        bigquery::{Row, RowSource},
        google_ads::{GoogleAdsClient, GoogleAdsConfig},
        secret_manager::SecretStore,
    },
    ConversionUploader, ConversionUploaderBuilder, SecretLocation, SecretPayload, UploadError,
};
use async_trait::async_trait;
use dotenvy::dotenv;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

/// Initializes the tracing subscriber and loads .env for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        dotenv().ok();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

pub const SECRET_PROJECT: &str = "secrets-project";
pub const SECRET_ID: &str = "google-ads-credentials";

/// The credential payload used across tests.
pub fn credentials_json() -> Value {
    json!({
        "credentials": {
            "developer_token": "test-dev-token",
            "client_id": "test-client-id",
            "client_secret": "test-client-secret",
            "refresh_token": "test-refresh-token",
            "login_customer_id": "111-222-3333"
        },
        "project_id": {
            "analytics-project": { "customer_id": "444-555-6666" }
        }
    })
}

// --- Mock Secret Store ---

#[derive(Clone, Debug)]
pub enum StoredSecret {
    Payload(Vec<u8>),
    Missing,
    Denied,
}

#[derive(Clone, Debug)]
pub struct MockSecretStore {
    pub secret: StoredSecret,
    pub accessed: Arc<Mutex<Vec<String>>>,
}

impl MockSecretStore {
    pub fn with_payload(payload: &Value) -> Self {
        Self::new(StoredSecret::Payload(payload.to_string().into_bytes()))
    }

    pub fn new(secret: StoredSecret) -> Self {
        Self {
            secret,
            accessed: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl SecretStore for MockSecretStore {
    async fn access_secret_version(
        &self,
        resource_name: &str,
    ) -> Result<SecretPayload, UploadError> {
        self.accessed.lock().unwrap().push(resource_name.to_string());
        match &self.secret {
            StoredSecret::Payload(data) => Ok(SecretPayload {
                data: data.clone(),
                crc32c: Some(crc32c::crc32c(data)),
            }),
            StoredSecret::Missing => Err(UploadError::SecretNotFound(resource_name.to_string())),
            StoredSecret::Denied => {
                Err(UploadError::SecretAccessDenied(resource_name.to_string()))
            }
        }
    }
}

// --- Mock Row Source ---

/// Returns canned rows, or a BigQuery-style "not found" error when `rows` is `None`.
#[derive(Clone, Debug)]
pub struct MockRowSource {
    pub rows: Option<Vec<Row>>,
    pub queries: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockRowSource {
    pub fn with_rows(rows: Vec<Value>) -> Self {
        Self {
            rows: Some(rows.into_iter().map(to_row).collect()),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn missing_table() -> Self {
        Self {
            rows: None,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl RowSource for MockRowSource {
    async fn fetch_rows(&self, project_id: &str, sql: &str) -> Result<Vec<Row>, UploadError> {
        self.queries
            .lock()
            .unwrap()
            .push((project_id.to_string(), sql.to_string()));
        self.rows.clone().ok_or_else(|| {
            UploadError::QueryExecution(
                "Not found: Table analytics-project:ads.missing was not found in location US"
                    .to_string(),
            )
        })
    }
}

pub fn to_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("rows must be JSON objects, got {other}"),
    }
}

/// Builds an uploader whose Google Ads and OAuth endpoints live on `base_url`.
pub fn build_uploader(
    base_url: &str,
    secret_store: MockSecretStore,
    row_source: MockRowSource,
) -> ConversionUploader {
    let google_ads = GoogleAdsClient::new(GoogleAdsConfig {
        api_url: base_url.to_string(),
        api_version: "v20".to_string(),
        token_url: format!("{base_url}/token"),
    })
    .expect("client should build");

    ConversionUploaderBuilder::new()
        .secret_location(SecretLocation::new(SECRET_PROJECT, SECRET_ID))
        .secret_store(Box::new(secret_store))
        .row_source(Box::new(row_source))
        .google_ads(google_ads)
        .build()
        .expect("uploader should build")
}
