use crate::errors::UploadError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use gcp_bigquery_client::{
    model::{
        get_query_results_parameters::GetQueryResultsParameters, query_request::QueryRequest,
        table_row::TableRow, table_schema::TableSchema,
    },
    Client,
};
use serde_json::Value;
use std::fmt::{self, Debug};
use tracing::{debug, info, warn};

/// One result row keyed by column name.
pub type Row = serde_json::Map<String, Value>;

/// How long BigQuery may hold the request open waiting for the job to finish.
const QUERY_TIMEOUT_MS: i32 = 120_000;

/// A source of query result rows.
#[async_trait]
pub trait RowSource: Send + Sync + DynClone + Debug {
    /// Runs `sql` billed to `project_id` and returns every row.
    async fn fetch_rows(&self, project_id: &str, sql: &str) -> Result<Vec<Row>, UploadError>;
}

dyn_clone::clone_trait_object!(RowSource);

/// A [`RowSource`] backed by Google BigQuery.
#[derive(Clone)]
pub struct BigQueryProvider {
    client: Client,
}

impl BigQueryProvider {
    /// Creates a provider authenticated with application default credentials.
    pub async fn new() -> Result<Self, UploadError> {
        let client = Client::from_application_default_credentials()
            .await
            .map_err(|e| UploadError::BigQueryClientBuild(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

impl Debug for BigQueryProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BigQueryProvider").finish_non_exhaustive()
    }
}

#[async_trait]
impl RowSource for BigQueryProvider {
    async fn fetch_rows(&self, project_id: &str, sql: &str) -> Result<Vec<Row>, UploadError> {
        info!("--> Executing BigQuery SQL in project '{project_id}'");
        debug!("{sql}");

        let response = self
            .client
            .job()
            .query(
                project_id,
                QueryRequest {
                    query: sql.to_string(),
                    timeout_ms: Some(QUERY_TIMEOUT_MS),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| UploadError::QueryExecution(e.to_string()))?;

        ensure_complete(response.job_complete)?;
        let columns = column_names(response.schema.as_ref());
        let total_rows = response.total_rows;
        let mut rows = to_rows(&columns, response.rows)?;

        let job = response.job_reference.unwrap_or_default();
        let mut page_token = response.page_token;
        while let Some(token) = page_token {
            let job_id = job.job_id.as_deref().ok_or_else(|| {
                UploadError::QueryExecution("paged result has no job reference".to_string())
            })?;
            debug!("--> Fetching next result page of job '{job_id}'");
            let page = self
                .client
                .job()
                .get_query_results(
                    project_id,
                    job_id,
                    GetQueryResultsParameters {
                        page_token: Some(token),
                        location: job.location.clone(),
                        timeout_ms: Some(QUERY_TIMEOUT_MS),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| UploadError::QueryExecution(e.to_string()))?;
            ensure_complete(page.job_complete)?;
            rows.extend(to_rows(&columns, page.rows)?);
            page_token = page.page_token;
        }

        if let Some(total) = total_rows.and_then(|t| t.parse::<usize>().ok()) {
            if total != rows.len() {
                warn!("BigQuery reported {total} rows but {} were read", rows.len());
            }
        }

        info!("<-- BigQuery returned {} rows", rows.len());
        Ok(rows)
    }
}

fn ensure_complete(job_complete: Option<bool>) -> Result<(), UploadError> {
    if job_complete == Some(false) {
        return Err(UploadError::QueryExecution(format!(
            "query did not complete within {QUERY_TIMEOUT_MS} ms"
        )));
    }
    Ok(())
}

fn column_names(schema: Option<&TableSchema>) -> Vec<String> {
    schema
        .and_then(|s| s.fields.as_ref())
        .map(|fields| fields.iter().map(|f| f.name.clone()).collect())
        .unwrap_or_default()
}

/// Keys each row's cells by the column at the same position in the schema.
fn to_rows(columns: &[String], rows: Option<Vec<TableRow>>) -> Result<Vec<Row>, UploadError> {
    rows.unwrap_or_default()
        .into_iter()
        .map(|row| {
            let cells = row.columns.unwrap_or_default();
            if cells.len() != columns.len() {
                return Err(UploadError::QueryExecution(format!(
                    "row has {} cells but the schema has {} columns",
                    cells.len(),
                    columns.len()
                )));
            }
            Ok(columns
                .iter()
                .cloned()
                .zip(cells.into_iter().map(|c| c.value.unwrap_or(Value::Null)))
                .collect())
        })
        .collect()
}
