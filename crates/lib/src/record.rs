//! # Conversion Records
//!
//! Maps query result rows onto click conversions. A row must name exactly one
//! click identifier (`click_id`, `gbraid` or `wbraid`); any row that names more
//! than one, or none, fails the whole batch before anything is uploaded.

use crate::{errors::UploadError, hashing::hash_identifier, providers::bigquery::Row};
use serde::Serialize;
use serde_json::Value;

/// The click identifier a conversion is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ConversionIdentifier {
    /// A Google click id (GCLID).
    ClickId(String),
    /// An iOS app-to-web click id.
    Gbraid(String),
    /// An iOS web-to-app click id.
    Wbraid(String),
}

/// One conversion ready to be sent to Google Ads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionRecord {
    pub value: f64,
    /// Passed through as received; the query is responsible for the
    /// `yyyy-mm-dd hh:mm:ss+|-hh:mm` format Google Ads expects.
    pub date: String,
    /// SHA-256 of the normalized email.
    pub hashed_email: Option<String>,
    /// SHA-256 of the normalized phone number.
    pub hashed_phone: Option<String>,
    pub order_id: Option<String>,
    pub identifier: ConversionIdentifier,
    pub conversion_action_id: String,
}

impl ConversionRecord {
    /// Builds a record from a result row. `index` is only used in errors.
    pub fn from_row(index: usize, row: &Row) -> Result<Self, UploadError> {
        let invalid = |reason: String| UploadError::InvalidConversionRecord { row: index, reason };

        let identifiers: Vec<ConversionIdentifier> = [
            text(row, "click_id").map(ConversionIdentifier::ClickId),
            text(row, "gbraid").map(ConversionIdentifier::Gbraid),
            text(row, "wbraid").map(ConversionIdentifier::Wbraid),
        ]
        .into_iter()
        .flatten()
        .collect();

        let identifier = match identifiers.len() {
            1 => identifiers.into_iter().next(),
            0 => None,
            n => {
                return Err(invalid(format!(
                    "{n} of click_id, gbraid and wbraid are set; exactly one is allowed"
                )))
            }
        }
        .ok_or_else(|| invalid("one of click_id, gbraid or wbraid is required".to_string()))?;

        let value = number(row, "value").map_err(invalid)?;
        let date = text(row, "date").ok_or_else(|| invalid("`date` is required".to_string()))?;
        let conversion_action_id = text(row, "conversion_action_id")
            .ok_or_else(|| invalid("`conversion_action_id` is required".to_string()))?;

        Ok(Self {
            value,
            date,
            hashed_email: text(row, "email").map(|email| hash_identifier(&email)),
            hashed_phone: text(row, "phone").map(|phone| hash_identifier(&phone)),
            order_id: text(row, "order_id"),
            identifier,
            conversion_action_id,
        })
    }
}

/// Maps every row, stopping at the first invalid one.
pub fn map_rows(rows: &[Row]) -> Result<Vec<ConversionRecord>, UploadError> {
    rows.iter()
        .enumerate()
        .map(|(index, row)| ConversionRecord::from_row(index, row))
        .collect()
}

// Null, missing and blank cells are all treated as absent.
fn text(row: &Row, column: &str) -> Option<String> {
    let s = match row.get(column)? {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    (!s.is_empty()).then_some(s)
}

// BigQuery's REST API returns numeric cells as strings.
fn number(row: &Row, column: &str) -> Result<f64, String> {
    let parsed = match row.get(column) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        Some(Value::Null) | None => return Err(format!("`{column}` is required")),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("`{column}` is not a finite number"))
}
