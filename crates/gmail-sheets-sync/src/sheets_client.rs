//! Sheets API client for the destination tab: header, existing rows and appends.

use crate::auth::{self, Authenticator, SHEETS_SCOPE};
use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::sync::Destination;
use google_sheets4::api::ValueRange;
use google_sheets4::hyper_rustls::HttpsConnector;
use google_sheets4::Sheets;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;

const HEADER_CELLS: &str = "A1:D1";
const DATA_CELLS: &str = "A2:D";
const APPEND_CELLS: &str = "A:D";

/// Client for the destination spreadsheet tab
pub struct SheetsClient {
    hub: Sheets<HttpsConnector<HttpConnector>>,
    spreadsheet_id: String,
    sheet_name: String,
}

impl SheetsClient {
    /// Build the client for the configured tab on a shared authenticator
    pub fn new(config: &Config, authenticator: Authenticator) -> SyncResult<Self> {
        let client = Client::builder(TokioExecutor::new()).build(auth::https_connector()?);
        let hub = Sheets::new(client, authenticator);

        tracing::info!("Sheets service initialized successfully");
        Ok(Self {
            hub,
            spreadsheet_id: config.spreadsheet_id.clone(),
            sheet_name: config.sheet_name.clone(),
        })
    }

    fn range(&self, cells: &str) -> String {
        a1_range(&self.sheet_name, cells)
    }

    async fn read_values(&self, cells: &str) -> SyncResult<Vec<Vec<String>>> {
        let (_, value_range) = self
            .hub
            .spreadsheets()
            .values_get(&self.spreadsheet_id, &self.range(cells))
            .add_scope(SHEETS_SCOPE)
            .doit()
            .await
            .map_err(|e| self.api_error(e, "Failed to read sheet values"))?;

        Ok(rows_from_values(value_range.values))
    }

    fn api_error(&self, err: google_sheets4::Error, action: &'static str) -> SyncError {
        if is_missing_sheet(&err) {
            SyncError::SheetNotFound(self.sheet_name.clone())
        } else {
            SyncError::Sheets(anyhow::Error::new(err).context(action))
        }
    }
}

impl Destination for SheetsClient {
    async fn header_row(&self) -> SyncResult<Vec<String>> {
        let rows = self.read_values(HEADER_CELLS).await?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    async fn write_header_row(&self, headers: &[&str]) -> SyncResult<()> {
        let request = ValueRange {
            values: Some(vec![headers
                .iter()
                .map(|h| Value::String(h.to_string()))
                .collect()]),
            ..Default::default()
        };

        self.hub
            .spreadsheets()
            .values_update(request, &self.spreadsheet_id, &self.range(HEADER_CELLS))
            .value_input_option("RAW")
            .add_scope(SHEETS_SCOPE)
            .doit()
            .await
            .map_err(|e| self.api_error(e, "Failed to write header row"))?;

        Ok(())
    }

    async fn data_rows(&self) -> SyncResult<Vec<Vec<String>>> {
        self.read_values(DATA_CELLS).await
    }

    async fn append_rows(&self, rows: Vec<Vec<String>>) -> SyncResult<usize> {
        if rows.is_empty() {
            return Ok(0);
        }

        let request = ValueRange {
            values: Some(
                rows.into_iter()
                    .map(|row| row.into_iter().map(Value::String).collect())
                    .collect(),
            ),
            ..Default::default()
        };

        let (_, response) = self
            .hub
            .spreadsheets()
            .values_append(request, &self.spreadsheet_id, &self.range(APPEND_CELLS))
            .value_input_option("RAW")
            .insert_data_option("INSERT_ROWS")
            .add_scope(SHEETS_SCOPE)
            .doit()
            .await
            .map_err(|e| self.api_error(e, "Failed to append rows"))?;

        let rows_added = response
            .updates
            .and_then(|updates| updates.updated_rows)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);

        tracing::info!("Successfully added {} row(s) to sheet", rows_added);
        Ok(rows_added)
    }
}

/// Build an A1-notation range, quoting the tab name when required
pub fn a1_range(sheet_name: &str, cells: &str) -> String {
    if sheet_name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        format!("{}!{}", sheet_name, cells)
    } else {
        format!("'{}'!{}", sheet_name.replace('\'', "''"), cells)
    }
}

fn rows_from_values(values: Option<Vec<Vec<Value>>>) -> Vec<Vec<String>> {
    values
        .unwrap_or_default()
        .iter()
        .map(|row| row.iter().map(cell_text).collect())
        .collect()
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Whether the API rejected the request because the tab does not exist.
///
/// A missing spreadsheet is a 404; a missing tab surfaces as a 400 that
/// cannot parse the range.
fn is_missing_sheet(err: &google_sheets4::Error) -> bool {
    match err {
        google_sheets4::Error::BadRequest(body) => {
            let code = body.pointer("/error/code").and_then(Value::as_u64);
            let message = body
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            code == Some(404) || (code == Some(400) && message.contains("Unable to parse range"))
        }
        google_sheets4::Error::Failure(response) => response.status().as_u16() == 404,
        _ => false,
    }
}
