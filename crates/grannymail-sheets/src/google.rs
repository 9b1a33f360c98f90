use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use grannymail_core::{SheetTable, TabularSource};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets/";

/// A range of a Google spreadsheet read through the Sheets v4 values API
pub struct GoogleSheetSource {
    client: Client,
    api_key: String,
    sheet_id: String,
    range: String,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl GoogleSheetSource {
    pub fn new(api_key: String, sheet_id: String, range: String) -> Result<Self> {
        if api_key.is_empty() || sheet_id.is_empty() || range.is_empty() {
            return Err(anyhow!("invalid google sheet configuration"));
        }
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            api_key,
            sheet_id,
            range,
        })
    }

    fn values_url(&self) -> Result<Url> {
        let mut url = Url::parse(SHEETS_API)?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("sheets API base cannot hold a path"))?
            .pop_if_empty()
            .extend([self.sheet_id.as_str(), "values", self.range.as_str()]);
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl TabularSource for GoogleSheetSource {
    async fn fetch(&self) -> Result<SheetTable> {
        let resp = self.client.get(self.values_url()?).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("sheet fetch failed: {} {}", status, text));
        }
        let body: ValueRange = resp.json().await?;
        let table = SheetTable::from_header_rows(body.values);
        tracing::debug!(rows = table.rows.len(), sheet = %self.sheet_id, "Fetched sheet");
        Ok(table)
    }
}
