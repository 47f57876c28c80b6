use std::time::Duration;

use reqwest::{Client, RequestBuilder, Url};
use tracing::debug;

use super::error::SheetsError;
use super::types::{to_json, Row, SpreadsheetMeta, ValueRange};

pub const API_URL: &str = "https://sheets.googleapis.com";

/// Source of header-keyed call-volume rows.
///
/// `fetch` is only ever called with a spreadsheet id that is present.
pub trait SheetSource {
    async fn fetch(
        &self,
        spreadsheet_id: &str,
        sheet_name: Option<&str>,
        range_name: Option<&str>,
    ) -> Result<Vec<Row>, SheetsError>;
}

/// How requests to the Sheets API are authorized. Credentials come from
/// configuration; the client never looks them up itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetsAuth {
    /// OAuth2 access token sent as `Authorization: Bearer`.
    Bearer(String),
    /// API key sent as the `key` query parameter (public sheets only).
    ApiKey(String),
}

pub struct SheetsClient {
    auth: SheetsAuth,
    client: Client,
    base_url: String,
    value_render_option: String,
}

impl SheetsClient {
    /// `base_url` is the API root, normally [`API_URL`].
    pub fn with_base_url(auth: SheetsAuth, base_url: String) -> Result<Self, SheetsError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            auth,
            client,
            base_url,
            value_render_option: "FORMATTED_VALUE".to_string(),
        })
    }

    /// Overrides the `valueRenderOption` (`FORMATTED_VALUE`, `UNFORMATTED_VALUE`, `FORMULA`).
    pub fn with_value_render_option(mut self, option: impl Into<String>) -> Self {
        self.value_render_option = option.into();
        self
    }

    /// Reads the raw rows of a range, header row included.
    pub async fn get_values(
        &self,
        spreadsheet_id: &str,
        sheet_name: Option<&str>,
        range_name: Option<&str>,
    ) -> Result<Vec<Vec<serde_json::Value>>, SheetsError> {
        let range = match resolve_range(sheet_name, range_name) {
            Some(range) => range,
            None => self.first_sheet_title(spreadsheet_id).await?,
        };
        debug!(spreadsheet_id, range = %range, "reading sheet values");

        let url = self.url(&["v4", "spreadsheets", spreadsheet_id, "values", &range])?;
        let request = self
            .client
            .get(url)
            .query(&[("valueRenderOption", self.value_render_option.as_str())]);

        let body: ValueRange = self.send(request).await?;
        Ok(body.values)
    }

    async fn first_sheet_title(&self, spreadsheet_id: &str) -> Result<String, SheetsError> {
        let url = self.url(&["v4", "spreadsheets", spreadsheet_id])?;
        let request = self
            .client
            .get(url)
            .query(&[("fields", "sheets.properties.title")]);

        let meta: SpreadsheetMeta = self.send(request).await?;
        meta.sheets
            .into_iter()
            .next()
            .map(|sheet| sheet.properties.title)
            .ok_or_else(|| SheetsError::NoSheets(spreadsheet_id.to_string()))
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SheetsError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| SheetsError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| SheetsError::InvalidUrl(self.base_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, SheetsError> {
        let request = match &self.auth {
            SheetsAuth::Bearer(token) => request.bearer_auth(token),
            SheetsAuth::ApiKey(key) => request.query(&[("key", key.as_str())]),
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(SheetsError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

impl SheetSource for SheetsClient {
    async fn fetch(
        &self,
        spreadsheet_id: &str,
        sheet_name: Option<&str>,
        range_name: Option<&str>,
    ) -> Result<Vec<Row>, SheetsError> {
        let rows = self.get_values(spreadsheet_id, sheet_name, range_name).await?;
        Ok(to_json(rows, true))
    }
}

/// A1 range to request, or `None` when the first sheet should be read whole.
///
/// A range without a sheet prefix is qualified with `sheet_name` when one is given.
fn resolve_range(sheet_name: Option<&str>, range_name: Option<&str>) -> Option<String> {
    match (sheet_name, range_name) {
        (Some(sheet), Some(range)) if !range.contains('!') => Some(format!("{sheet}!{range}")),
        (_, Some(range)) => Some(range.to_string()),
        (Some(sheet), None) => Some(sheet.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheets::CellValue;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn range_resolution() {
        assert_eq!(
            resolve_range(Some("202501"), Some("A1:D10")).as_deref(),
            Some("202501!A1:D10")
        );
        assert_eq!(
            resolve_range(Some("202501"), Some("Other!A1:D10")).as_deref(),
            Some("Other!A1:D10")
        );
        assert_eq!(resolve_range(None, Some("A1:B2")).as_deref(), Some("A1:B2"));
        assert_eq!(resolve_range(Some("202501"), None).as_deref(), Some("202501"));
        assert_eq!(resolve_range(None, None), None);
    }

    #[tokio::test]
    async fn fetch_converts_rows_to_records() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-123/values/202501"))
            .and(query_param("valueRenderOption", "FORMATTED_VALUE"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "'202501'!A1:C3",
                "majorDimension": "ROWS",
                "values": [
                    ["hour", "income_call", "answer_call"],
                    ["9", "100", "95"],
                    ["10", "120"]
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            SheetsClient::with_base_url(SheetsAuth::Bearer("tok".into()), server.uri()).unwrap();
        let rows = client.fetch("sheet-123", Some("202501"), None).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["answer_call"], CellValue::Text("95".into()));
        assert_eq!(rows[1]["answer_call"], CellValue::Null);
    }

    #[tokio::test]
    async fn fetch_without_selectors_reads_first_sheet() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/abc"))
            .and(query_param("key", "k-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sheets": [
                    {"properties": {"title": "Calls"}},
                    {"properties": {"title": "Archive"}}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/abc/values/Calls"))
            .and(query_param("key", "k-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Calls!A1:B2",
                "values": [["income_call", "answer_call"], [10, 9]]
            })))
            .mount(&server)
            .await;

        let client =
            SheetsClient::with_base_url(SheetsAuth::ApiKey("k-1".into()), server.uri()).unwrap();
        let rows = client.fetch("abc", None, None).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["income_call"], CellValue::Number(10.into()));
    }

    #[tokio::test]
    async fn api_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Requested entity was not found."))
            .mount(&server)
            .await;

        let client =
            SheetsClient::with_base_url(SheetsAuth::Bearer("tok".into()), server.uri()).unwrap();
        let err = client.fetch("missing", Some("202501"), None).await.unwrap_err();

        match err {
            SheetsError::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Requested entity was not found.");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn spreadsheet_without_sheets_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/empty"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client =
            SheetsClient::with_base_url(SheetsAuth::Bearer("tok".into()), server.uri()).unwrap();
        let err = client.fetch("empty", None, None).await.unwrap_err();
        assert!(matches!(err, SheetsError::NoSheets(id) if id == "empty"));
    }

    #[tokio::test]
    async fn custom_render_option_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/s/values/Sheet1!A1:B2"))
            .and(query_param("valueRenderOption", "UNFORMATTED_VALUE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"range": "Sheet1!A1:B2"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = SheetsClient::with_base_url(SheetsAuth::Bearer("t".into()), server.uri())
            .unwrap()
            .with_value_render_option("UNFORMATTED_VALUE");
        let rows = client.fetch("s", Some("Sheet1"), Some("A1:B2")).await.unwrap();
        assert!(rows.is_empty());
    }
}
