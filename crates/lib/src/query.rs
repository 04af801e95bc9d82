//! # Query Construction
//!
//! Builds the BigQuery Standard SQL statement that selects the conversion
//! columns from the caller's table. Identifiers are only checked for presence;
//! a malformed table or column expression surfaces as a query execution error.

use crate::{providers::google_ads::MAX_CONVERSIONS_PER_UPLOAD, types::QueryConfig};

/// Builds the select statement for a [`QueryConfig`].
///
/// Each contract column is selected as `<expression> AS <column>` and rows are
/// returned newest first. One row past the upload cap is requested so an
/// oversized table can be told apart from one that fits exactly.
pub fn build_query(config: &QueryConfig) -> String {
    let select_list = config
        .columns
        .pairs()
        .iter()
        .map(|(expr, column)| format!("  {} AS `{column}`", expr.trim()))
        .collect::<Vec<String>>()
        .join(",\n");

    format!(
        "SELECT\n{select_list}\nFROM `{table}`\nORDER BY `date` DESC\nLIMIT {limit}",
        table = config.table_path(),
        limit = MAX_CONVERSIONS_PER_UPLOAD + 1
    )
}
