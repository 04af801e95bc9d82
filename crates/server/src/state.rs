//! # Application State
//!
//! Holds the conversion uploader shared by every request, and wires the
//! production collaborators together at startup.

use crate::config::AppConfig;
use ads_uploader::{
    providers::{
        bigquery::{BigQueryProvider, RowSource},
        google_ads::GoogleAdsClient,
        secret_manager::{SecretManagerProvider, TokenSource},
    },
    ConversionUploader, ConversionUploaderBuilder, SecretLocation,
};
use std::sync::Arc;
use tracing::info;

/// The shared application state, accessible from all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub uploader: Arc<ConversionUploader>,
}

impl AppState {
    pub fn new(uploader: ConversionUploader) -> Self {
        Self {
            uploader: Arc::new(uploader),
        }
    }
}

/// Builds an uploader from the configuration around the given row source.
pub fn build_uploader(
    config: &AppConfig,
    row_source: Box<dyn RowSource>,
) -> anyhow::Result<ConversionUploader> {
    let token_source = match &config.secret_manager.access_token {
        Some(token) => TokenSource::Static(token.clone()),
        None => TokenSource::Metadata {
            url: config.secret_manager.metadata_token_url.clone(),
        },
    };
    let secret_store = SecretManagerProvider::new(&config.secret_manager.api_url, token_source)?;
    let location = SecretLocation::new(&config.project_id, &config.secret_id)
        .with_version(&config.secret_version);
    info!("Credentials will be read from '{}'", location.resource_name());

    let uploader = ConversionUploaderBuilder::new()
        .secret_location(location)
        .secret_store(Box::new(secret_store))
        .row_source(row_source)
        .google_ads(GoogleAdsClient::new(config.google_ads.clone())?)
        .build()?;
    Ok(uploader)
}

/// Builds the shared application state from the configuration.
///
/// BigQuery is reached with application default credentials.
pub async fn build_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let bigquery = BigQueryProvider::new().await?;
    let uploader = build_uploader(config, Box::new(bigquery))?;
    Ok(AppState::new(uploader))
}
