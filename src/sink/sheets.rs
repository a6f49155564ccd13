// src/sink/sheets.rs
//! Google Sheets v4 values API over plain HTTP.
//!
//! Obtaining the OAuth access token is someone else's job; the store only
//! needs a bearer token that is valid for the duration of a run.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{Row, TabularStore};
use crate::error::{DigestError, Result};

pub const DEFAULT_SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com";

pub struct GoogleSheetsStore {
    http: reqwest::Client,
    base: reqwest::Url,
    spreadsheet_id: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProps,
}

#[derive(Debug, Deserialize)]
struct SheetProps {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

impl GoogleSheetsStore {
    pub fn new(spreadsheet_id: &str, token: &str) -> Result<Self> {
        Self::with_endpoint(DEFAULT_SHEETS_ENDPOINT, spreadsheet_id, token)
    }

    pub fn with_endpoint(endpoint: &str, spreadsheet_id: &str, token: &str) -> Result<Self> {
        let base = reqwest::Url::parse(endpoint)
            .map_err(|e| DigestError::Config(format!("sheets endpoint {endpoint:?}: {e}")))?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DigestError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base,
            spreadsheet_id: spreadsheet_id.to_string(),
            token: token.to_string(),
        })
    }

    /// `<base>/v4/spreadsheets/<id><suffix>[/values/<range><verb>]`
    fn url(&self, id_suffix: &str, values: Option<(&str, &str)>) -> Result<reqwest::Url> {
        let mut url = self.base.clone();
        {
            let mut seg = url
                .path_segments_mut()
                .map_err(|_| DigestError::Config("sheets endpoint cannot be a base".into()))?;
            seg.pop_if_empty()
                .push("v4")
                .push("spreadsheets")
                .push(&format!("{}{}", self.spreadsheet_id, id_suffix));
            if let Some((range, verb)) = values {
                seg.push("values").push(&format!("{range}{verb}"));
            }
        }
        Ok(url)
    }

    async fn send_json(
        &self,
        table: &str,
        req: reqwest::RequestBuilder,
    ) -> std::result::Result<reqwest::Response, String> {
        let resp = req
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(table, %status, %body, "sheets error body");
            return Err(format!("http status {status}"));
        }
        Ok(resp)
    }

    async fn sheet_titles(&self) -> std::result::Result<Vec<String>, String> {
        let url = self.url("", None).map_err(|e| e.to_string())?;
        let req = self
            .http
            .get(url)
            .query(&[("fields", "sheets.properties.title")]);
        let meta: SpreadsheetMeta = self
            .send_json("", req)
            .await?
            .json()
            .await
            .map_err(|e| e.to_string())?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }
}

/// A1 range naming a whole sheet.
fn quote_sheet(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn cell_to_string(v: serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TabularStore for GoogleSheetsStore {
    async fn ensure_table(&self, table: &str) -> Result<()> {
        let titles = self
            .sheet_titles()
            .await
            .map_err(|e| DigestError::sink_read(table, e))?;
        if titles.iter().any(|t| t == table) {
            return Ok(());
        }
        tracing::info!(table, "creating missing sheet");
        let url = self.url(":batchUpdate", None)?;
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": table,
                        "gridProperties": { "rowCount": 1000, "columnCount": 10 }
                    }
                }
            }]
        });
        self.send_json(table, self.http.post(url).json(&body))
            .await
            .map(|_| ())
            .map_err(|e| DigestError::sink_write(table, e))
    }

    async fn append_rows(&self, table: &str, rows: &[Row]) -> Result<()> {
        let url = self.url("", Some((&quote_sheet(table), ":append")))?;
        let req = self
            .http
            .post(url)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": rows }));
        self.send_json(table, req)
            .await
            .map(|_| ())
            .map_err(|e| DigestError::sink_write(table, e))
    }

    async fn read_rows(&self, table: &str) -> Result<Vec<Row>> {
        let url = self.url("", Some((&quote_sheet(table), "")))?;
        let vr: ValueRange = self
            .send_json(table, self.http.get(url))
            .await
            .map_err(|e| DigestError::sink_read(table, e))?
            .json()
            .await
            .map_err(|e| DigestError::sink_read(table, e))?;
        Ok(vr
            .values
            .into_iter()
            .map(|r| r.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn clear(&self, table: &str) -> Result<()> {
        let url = self.url("", Some((&quote_sheet(table), ":clear")))?;
        self.send_json(table, self.http.post(url).json(&json!({})))
            .await
            .map(|_| ())
            .map_err(|e| DigestError::sink_write(table, e))
    }

    async fn write_rows(&self, table: &str, rows: &[Row]) -> Result<()> {
        let range = format!("{}!A1", quote_sheet(table));
        let url = self.url("", Some((&range, "")))?;
        let req = self
            .http
            .put(url)
            .query(&[("valueInputOption", "RAW")])
            .json(&json!({ "majorDimension": "ROWS", "values": rows }));
        self.send_json(table, req)
            .await
            .map(|_| ())
            .map_err(|e| DigestError::sink_write(table, e))
    }

    async fn close(&self) -> Result<()> {
        tracing::debug!(spreadsheet = %self.spreadsheet_id, "sheets session closed");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "google_sheets"
    }
}
