//! # Common Test Utilities
//!
//! `TestApp` spawns the real router on a random port. Secret Manager, the
//! OAuth token endpoint and Google Ads are served by an `httpmock::MockServer`;
//! BigQuery is replaced by an in-memory `RowSource`.

// Not every test file uses every helper.
#![allow(unused)]

use ads_uploader::{
    providers::bigquery::{Row, RowSource},
    UploadError,
};
use ads_uploader_server::{
    config::{self, AppConfig},
    router,
    state::{build_uploader, AppState},
};
use anyhow::Result;
use async_trait::async_trait;
use axum::serve;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use httpmock::prelude::*;
use reqwest::Client;
use serde_json::{json, Value};
use std::{
    fs::File,
    io::Write,
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tempfile::{tempdir, TempDir};
use tokio::{net::TcpListener, task::JoinHandle};

pub const SECRET_PROJECT: &str = "ads-conversion-uploader";
pub const SECRET_ID: &str = "ads-creds";
pub const SECRET_PATH: &str =
    "/v1/projects/ads-conversion-uploader/secrets/ads-creds/versions/latest:access";
pub const UPLOAD_PATH: &str = "/v20/customers/4445556666:uploadClickConversions";
pub const STATIC_TOKEN: &str = "sm-test-token";

// --- In-memory row source ---

/// Serves canned rows, or a "table not found" error when `rows` is `None`.
#[derive(Clone, Debug, Default)]
pub struct StaticRowSource {
    pub rows: Option<Vec<Row>>,
    pub queries: Arc<Mutex<Vec<String>>>,
}

impl StaticRowSource {
    pub fn new(rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect();
        Self {
            rows: Some(rows),
            queries: Arc::default(),
        }
    }

    pub fn missing_table() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RowSource for StaticRowSource {
    async fn fetch_rows(&self, _project_id: &str, sql: &str) -> Result<Vec<Row>, UploadError> {
        self.queries.lock().unwrap().push(sql.to_string());
        self.rows.clone().ok_or_else(|| {
            UploadError::QueryExecution("Not found: Table analytics:ads.conversions".to_string())
        })
    }
}

/// The stored credential payload used by server tests.
pub fn credentials_json() -> Value {
    json!({
        "credentials": {
            "developer_token": "test-dev-token",
            "client_id": "test-client-id",
            "client_secret": "test-client-secret",
            "refresh_token": "test-refresh-token",
            "login_customer_id": "1112223333"
        },
        "project_id": {
            "analytics": { "account_id": "444-555-6666" }
        }
    })
}

/// A Secret Manager `:access` response body for `data`.
pub fn secret_response(data: &[u8]) -> Value {
    json!({
        "name": "projects/123/secrets/ads-creds/versions/1",
        "payload": {
            "data": STANDARD.encode(data),
            "dataCrc32c": crc32c::crc32c(data).to_string()
        }
    })
}

// --- Full Application Test Harness ---

/// A harness for end-to-end testing of the Axum server.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub mock_server: MockServer,
    pub row_source: StaticRowSource,
    pub app_state: AppState,
    _config_dir: TempDir,
    _server_handle: JoinHandle<()>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestApp {
    /// Spawns the application with the given query rows.
    pub async fn spawn(row_source: StaticRowSource) -> Result<Self> {
        dotenvy::dotenv().ok();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .compact()
            .try_init();

        let mock_server = MockServer::start_async().await;

        let config_dir = tempdir()?;
        let config_path = config_dir.path().join("config.yml");
        let config_content = format!(
            r#"
port: 0
project_id: "{SECRET_PROJECT}"
secret_id: "{SECRET_ID}"
google_ads:
  api_url: "{}"
  api_version: "v20"
  token_url: "{}"
secret_manager:
  api_url: "{}"
  access_token: "{STATIC_TOKEN}"
"#,
            mock_server.base_url(),
            mock_server.url("/token"),
            mock_server.base_url(),
        );
        let mut file = File::create(&config_path)?;
        file.write_all(config_content.as_bytes())?;

        let config: AppConfig = config::get_config(config_path.to_str())?;
        let uploader = build_uploader(&config, Box::new(row_source.clone()))?;
        let app_state = AppState::new(uploader);
        let app_state_for_harness = app_state.clone();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let address = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let server_handle = tokio::spawn(async move {
            let app = router::create_router(app_state);
            let server = serve(listener, app).with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            });
            if let Err(e) = server.await {
                tracing::error!("[TestApp] Server error: {}", e);
            }
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        Ok(Self {
            address,
            client: Client::new(),
            mock_server,
            row_source,
            app_state: app_state_for_harness,
            _config_dir: config_dir,
            _server_handle: server_handle,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// Serves the standard credential secret.
    pub async fn mock_secret(&self) -> httpmock::Mock<'_> {
        let body = secret_response(credentials_json().to_string().as_bytes());
        self.mock_server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(SECRET_PATH)
                    .header("authorization", format!("Bearer {STATIC_TOKEN}"));
                then.status(200).json_body(body);
            })
            .await
    }

    /// Serves a successful OAuth refresh.
    pub async fn mock_token(&self) -> httpmock::Mock<'_> {
        self.mock_server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/token")
                    .body_contains("grant_type=refresh_token");
                then.status(200)
                    .json_body(json!({ "access_token": "ya29.server-test" }));
            })
            .await
    }

    pub async fn post_upload(&self, body: &Value) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}/", self.address))
            .json(body)
            .send()
            .await?)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
