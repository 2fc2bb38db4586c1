use crate::error::SheetsError;
use crate::sheets::auth::{ServiceAccountAuth, ServiceAccountKey};
use crate::sheets::SheetBackend;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Columns A..M hold the lead table
const TABLE_COLUMNS: &str = "A:M";

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Google Sheets v4 client bound to one worksheet
pub struct SheetsClient {
    http: Client,
    auth: ServiceAccountAuth,
    spreadsheet_id: String,
    sheet_name: String,
}

impl SheetsClient {
    pub fn new(
        credentials_file: &Path,
        spreadsheet_id: impl Into<String>,
        sheet_name: impl Into<String>,
    ) -> Result<Self, SheetsError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        let key = ServiceAccountKey::from_file(credentials_file)?;
        let auth = ServiceAccountAuth::new(key, http.clone());

        Ok(Self {
            http,
            auth,
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
        })
    }

    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Service account the spreadsheet must be shared with
    pub fn client_email(&self) -> &str {
        self.auth.client_email()
    }

    /// A1 range on this worksheet, e.g. `'Leads'!A:M`
    fn range(&self, cells: &str) -> String {
        a1_range(&self.sheet_name, cells)
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/{}/values/{}{}",
            API_BASE,
            self.spreadsheet_id,
            urlencoding::encode(range),
            suffix
        )
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, SheetsError> {
        let token = self.auth.token().await?;
        let response = request.bearer_auth(token).send().await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, SheetsError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(SheetsError::RateLimited);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(SheetsError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

/// Quote a worksheet title for A1 notation
pub fn a1_range(sheet_name: &str, cells: &str) -> String {
    format!("'{}'!{}", sheet_name.replace('\'', "''"), cells)
}

/// 1-based column number to letters: 1 -> A, 27 -> AA
pub fn column_letters(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(b'A' + rem as u8);
        column = (column - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

#[async_trait]
impl SheetBackend for SheetsClient {
    async fn ensure_worksheet(&self) -> Result<(), SheetsError> {
        let url = format!("{}/{}", API_BASE, self.spreadsheet_id);
        let meta: SpreadsheetMeta = self
            .send(self.http.get(&url).query(&[("fields", "sheets.properties.title")]))
            .await?
            .json()
            .await?;

        if meta.sheets.iter().any(|s| s.properties.title == self.sheet_name) {
            debug!("Worksheet '{}' exists", self.sheet_name);
            return Ok(());
        }

        info!("Creating worksheet '{}'", self.sheet_name);
        let body = json!({
            "requests": [{
                "addSheet": {
                    "properties": {
                        "title": self.sheet_name,
                        "gridProperties": { "rowCount": 2000, "columnCount": 20 }
                    }
                }
            }]
        });
        self.send(self.http.post(format!("{}:batchUpdate", url)).json(&body))
            .await?;
        Ok(())
    }

    async fn read_rows(&self) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.values_url(&self.range(TABLE_COLUMNS), "");
        let range: ValueRange = self.send(self.http.get(&url)).await?.json().await?;
        Ok(range.values)
    }

    async fn append_rows(&self, rows: &[Vec<String>]) -> Result<(), SheetsError> {
        let url = self.values_url(&self.range(TABLE_COLUMNS), ":append");
        let request = self
            .http
            .post(&url)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": rows }));
        self.send(request).await?;
        Ok(())
    }

    async fn update_cells(
        &self,
        row: usize,
        first_column: usize,
        values: &[String],
    ) -> Result<(), SheetsError> {
        let last_column = first_column + values.len().saturating_sub(1);
        let range = self.range(&format!(
            "{}{}:{}{}",
            column_letters(first_column),
            row,
            column_letters(last_column),
            row
        ));
        let url = self.values_url(&range, "");
        let request = self
            .http
            .put(&url)
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&json!({ "range": range, "majorDimension": "ROWS", "values": [values] }));
        self.send(request).await?;
        Ok(())
    }
}
