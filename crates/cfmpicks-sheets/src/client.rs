// Spreadsheet values API client.
//
// Only the three value operations the mirror and the importer need: read a
// range, append rows to a range, and replace a range wholesale.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SheetsError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        source: reqwest::Error,
    },

    #[error("spreadsheet API returned {status} for {url}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response body from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("spreadsheet {spreadsheet_id} unavailable: {message}")]
    Unavailable {
        spreadsheet_id: String,
        message: String,
    },
}

/// The value operations used against a spreadsheet. `SheetsClient` talks to
/// the real API; `memory::MemorySheets` keeps everything in process.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// All rows in `range`, every cell rendered as a string. Trailing empty
    /// cells may be missing from a row.
    async fn read_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError>;

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetsError>;

    /// Clear `range` and write `rows` starting at its top-left cell.
    async fn replace_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetsError>;
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// HTTP client for the spreadsheet values API, authenticated with a bearer
/// access token.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    http: reqwest::Client,
    api_base: String,
    access_token: String,
}

impl SheetsClient {
    pub fn new(api_base: &str, access_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{spreadsheet_id}/values/{range}",
            self.api_base
        )
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, SheetsError> {
        let response = request
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|source| SheetsError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SheetsError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl SheetsApi for SheetsClient {
    async fn read_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.values_url(spreadsheet_id, range);
        let response = self.send(self.http.get(&url), &url).await?;
        let body: ValueRange = response.json().await.map_err(|e| SheetsError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;
        debug!(spreadsheet_id, range, rows = body.values.len(), "read range");
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetsError> {
        let url = format!(
            "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.values_url(spreadsheet_id, range)
        );
        let count = rows.len();
        let body = serde_json::json!({ "majorDimension": "ROWS", "values": rows });
        self.send(self.http.post(&url).json(&body), &url).await?;
        debug!(spreadsheet_id, range, rows = count, "appended rows");
        Ok(())
    }

    async fn replace_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<String>>,
    ) -> Result<(), SheetsError> {
        let clear_url = format!("{}:clear", self.values_url(spreadsheet_id, range));
        self.send(
            self.http.post(&clear_url).json(&serde_json::json!({})),
            &clear_url,
        )
        .await?;

        let url = format!(
            "{}?valueInputOption=RAW",
            self.values_url(spreadsheet_id, range)
        );
        let count = rows.len();
        let body = serde_json::json!({ "range": range, "majorDimension": "ROWS", "values": rows });
        self.send(self.http.put(&url).json(&body), &url).await?;
        debug!(spreadsheet_id, range, rows = count, "replaced range");
        Ok(())
    }
}

/// Render a cell the way it appears in the sheet. Numbers and booleans come
/// back unformatted when the sheet stores them as such.
fn cell_to_string(cell: Value) -> String {
    match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
