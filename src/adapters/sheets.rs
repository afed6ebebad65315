use crate::domain::ports::{SheetGateway, TokenSource};
use crate::utils::error::{EnricherError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

pub const DEFAULT_SHEETS_ENDPOINT: &str = "https://sheets.googleapis.com";

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Google Sheets v4 values API.
pub struct GoogleSheets<T: TokenSource> {
    client: Client,
    base_url: Url,
    spreadsheet_id: String,
    tokens: T,
}

impl<T: TokenSource> GoogleSheets<T> {
    pub fn new(
        base_url: &str,
        spreadsheet_id: impl Into<String>,
        tokens: T,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| EnricherError::InvalidConfigValueError {
            field: "sheets.endpoint".to_string(),
            value: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            spreadsheet_id: spreadsheet_id.into(),
            tokens,
        })
    }

    fn values_url(&self, range_segment: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EnricherError::config("sheets endpoint cannot be a base URL"))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", range_segment]);
        Ok(url)
    }

    async fn check(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|b| b.error.message)
            .unwrap_or(body);

        Err(EnricherError::SheetsApiError {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl<T: TokenSource> SheetGateway for GoogleSheets<T> {
    async fn read_column(&self, range: &str) -> Result<Vec<String>> {
        let url = self.values_url(range)?;
        let token = self.tokens.access_token().await?;

        let response = self.client.get(url).bearer_auth(token).send().await?;
        let range_values: ValueRange = Self::check(response).await?.json().await?;

        // 空白列在 API 回應中是空陣列
        Ok(range_values
            .values
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter(|cell| !cell.is_empty())
            .collect())
    }

    async fn append_row(&self, sheet_name: &str, values: &[String]) -> Result<()> {
        let url = self.values_url(&format!("{}!A2:append", sheet_name))?;
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .query(&[
                ("valueInputOption", "USER_ENTERED"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": [values] }))
            .send()
            .await?;
        Self::check(response).await?;

        tracing::debug!("Appended {} cells to {}", values.len(), sheet_name);
        Ok(())
    }
}
