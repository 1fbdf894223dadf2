//! Google Sheets v4 `spreadsheets.values` client.

use crate::a1::{CellAddress, SheetRange};
use crate::credentials::{CredentialError, CredentialSource};
use crate::store::{Grid, SheetsError, StoreProvider, TabularStore};
use async_trait::async_trait;
use google_cloud_auth::credentials::service_account::{AccessSpecifier, Builder};
use google_cloud_auth::credentials::{CacheableResource, Credentials};
use http::{Extensions, HeaderMap};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://sheets.googleapis.com";
pub const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Supplies the authorization headers attached to every API request.
#[async_trait]
pub trait HeaderSource: Send + Sync {
    async fn headers(&self) -> Result<HeaderMap, SheetsError>;
}

struct ServiceAccountHeaders {
    credentials: Credentials,
}

#[async_trait]
impl HeaderSource for ServiceAccountHeaders {
    async fn headers(&self) -> Result<HeaderMap, SheetsError> {
        let headers = self
            .credentials
            .headers(Extensions::new())
            .await
            .map_err(|e| SheetsError::Auth(e.to_string()))?;

        match headers {
            CacheableResource::New { data, .. } => Ok(data),
            CacheableResource::NotModified => {
                Err(SheetsError::Auth("no authorization headers returned".into()))
            }
        }
    }
}

/// Fixed headers, for talking to local or already-authorized endpoints.
pub struct StaticHeaders(pub HeaderMap);

#[async_trait]
impl HeaderSource for StaticHeaders {
    async fn headers(&self) -> Result<HeaderMap, SheetsError> {
        Ok(self.0.clone())
    }
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub struct GoogleSheetsClient {
    http: reqwest::Client,
    base_url: Url,
    spreadsheet_id: String,
    auth: Arc<dyn HeaderSource>,
}

impl GoogleSheetsClient {
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        spreadsheet_id: String,
        auth: Arc<dyn HeaderSource>,
    ) -> Self {
        GoogleSheetsClient {
            http,
            base_url,
            spreadsheet_id,
            auth,
        }
    }

    fn values_url(&self, range: &str) -> Result<Url, SheetsError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SheetsError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str(), "values", range]);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(SheetsError::Status { status, body })
    }
}

#[async_trait]
impl TabularStore for GoogleSheetsClient {
    async fn get_values(&self, range: &SheetRange) -> Result<Grid, SheetsError> {
        let range = range.to_string();
        let url = self.values_url(&range)?;
        tracing::debug!(range = %range, "reading values");

        let response = self
            .http
            .get(url)
            .headers(self.auth.headers().await?)
            .send()
            .await?;
        let value_range = Self::check(response).await?.json::<ValueRange>().await?;

        Ok(value_range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }

    async fn update_value(&self, cell: &CellAddress, value: &str) -> Result<(), SheetsError> {
        let range = cell.to_string();
        let url = self.values_url(&range)?;
        tracing::debug!(range = %range, "updating value");

        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": [[value]],
        });

        let response = self
            .http
            .put(url)
            .headers(self.auth.headers().await?)
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;

        Ok(())
    }
}

/// Builds a `GoogleSheetsClient` authorized with a service account key.
///
/// The key is loaded and decoded on every `connect`, so each request works
/// with whatever credentials are currently configured.
pub struct GoogleSheetsProvider {
    http: reqwest::Client,
    base_url: Url,
    spreadsheet_id: String,
    credentials: CredentialSource,
    scopes: Vec<String>,
}

impl GoogleSheetsProvider {
    pub fn new(
        spreadsheet_id: &str,
        api_base_url: &str,
        credentials: CredentialSource,
    ) -> Result<Self, SheetsError> {
        let base_url =
            Url::parse(api_base_url).map_err(|e| SheetsError::InvalidUrl(e.to_string()))?;

        Ok(GoogleSheetsProvider {
            http: reqwest::Client::new(),
            base_url,
            spreadsheet_id: spreadsheet_id.to_string(),
            credentials,
            scopes: vec![SPREADSHEETS_SCOPE.to_string()],
        })
    }

    fn build_credentials(&self) -> Result<Credentials, SheetsError> {
        let key = self.credentials.load()?;
        tracing::debug!(client_email = %key.client_email, "building service account credentials");

        let credentials = Builder::new(key.into_json())
            .with_access_specifier(AccessSpecifier::from_scopes(self.scopes.clone()))
            .build()
            .map_err(|e| CredentialError::Auth(e.to_string()))?;

        Ok(credentials)
    }
}

#[async_trait]
impl StoreProvider for GoogleSheetsProvider {
    async fn connect(&self) -> Result<Arc<dyn TabularStore>, SheetsError> {
        let credentials = self.build_credentials()?;

        Ok(Arc::new(GoogleSheetsClient::new(
            self.http.clone(),
            self.base_url.clone(),
            self.spreadsheet_id.clone(),
            Arc::new(ServiceAccountHeaders { credentials }),
        )))
    }

    fn credentials_available(&self) -> bool {
        self.credentials.load().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap as AxumHeaders, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Recorded {
        gets: Vec<(String, String, Option<String>)>,
        puts: Vec<(String, HashMap<String, String>, Value)>,
    }

    type Shared = Arc<Mutex<Recorded>>;

    async fn get_values(
        State(recorded): State<Shared>,
        Path((id, range)): Path<(String, String)>,
        headers: AxumHeaders,
    ) -> Result<Json<Value>, StatusCode> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        recorded.lock().unwrap().gets.push((id.clone(), range.clone(), auth));

        match id.as_str() {
            "empty" => Ok(Json(json!({ "range": range, "majorDimension": "ROWS" }))),
            "forbidden" => Err(StatusCode::FORBIDDEN),
            _ => Ok(Json(json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": [["ID", "Nombre", "Si/No"], ["AB123", "Ana"], ["CD456", 42, null]],
            }))),
        }
    }

    async fn put_values(
        State(recorded): State<Shared>,
        Path((_id, range)): Path<(String, String)>,
        Query(query): Query<HashMap<String, String>>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        recorded.lock().unwrap().puts.push((range, query, body));
        Json(json!({ "updatedCells": 1 }))
    }

    async fn start_test_server() -> (Url, Shared) {
        let recorded = Shared::default();
        let app = Router::new()
            .route(
                "/v4/spreadsheets/{id}/values/{range}",
                get(get_values).put(put_values),
            )
            .with_state(recorded.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
        (url, recorded)
    }

    fn client(base_url: Url, spreadsheet_id: &str) -> GoogleSheetsClient {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer test-token".parse().unwrap());
        GoogleSheetsClient::new(
            reqwest::Client::new(),
            base_url,
            spreadsheet_id.to_string(),
            Arc::new(StaticHeaders(headers)),
        )
    }

    #[tokio::test]
    async fn test_get_values() {
        let (url, recorded) = start_test_server().await;
        let client = client(url, "sheet-id");

        let grid = client
            .get_values(&SheetRange::new("Hoja 1", "A:Z"))
            .await
            .unwrap();

        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0], vec!["ID", "Nombre", "Si/No"]);
        assert_eq!(grid[1], vec!["AB123", "Ana"]);
        assert_eq!(grid[2], vec!["CD456", "42", ""]);

        let recorded = recorded.lock().unwrap();
        assert_eq!(
            recorded.gets[0],
            (
                "sheet-id".to_string(),
                "'Hoja 1'!A:Z".to_string(),
                Some("Bearer test-token".to_string())
            )
        );
    }

    #[tokio::test]
    async fn test_get_values_without_rows() {
        let (url, _recorded) = start_test_server().await;
        let grid = client(url, "empty")
            .get_values(&SheetRange::new("Sheet1", "A:Z"))
            .await
            .unwrap();
        assert!(grid.is_empty());
    }

    #[tokio::test]
    async fn test_error_status() {
        let (url, _recorded) = start_test_server().await;
        let result = client(url, "forbidden")
            .get_values(&SheetRange::new("Sheet1", "A:Z"))
            .await;

        match result {
            Err(SheetsError::Status { status, .. }) => {
                assert_eq!(status, reqwest::StatusCode::FORBIDDEN)
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_value() {
        let (url, recorded) = start_test_server().await;
        let cell = CellAddress::from_index("Sheet1", 2, 5);

        client(url, "sheet-id")
            .update_value(&cell, "SI")
            .await
            .unwrap();

        let recorded = recorded.lock().unwrap();
        let (range, query, body) = &recorded.puts[0];
        assert_eq!(range, "Sheet1!C5");
        assert_eq!(query.get("valueInputOption").map(String::as_str), Some("RAW"));
        assert_eq!(body["range"], "Sheet1!C5");
        assert_eq!(body["values"], json!([["SI"]]));
    }

    #[tokio::test]
    async fn test_connect_without_credentials() {
        let provider = GoogleSheetsProvider::new(
            "sheet-id",
            DEFAULT_API_BASE_URL,
            CredentialSource::Env {
                var: "RSVP_TEST_CREDENTIALS_THAT_ARE_NEVER_SET".into(),
            },
        )
        .unwrap();

        assert!(!provider.credentials_available());
        let err = provider.connect().await.err().unwrap();
        assert!(err.is_configuration());
        assert!(matches!(
            err,
            SheetsError::Credentials(CredentialError::Missing(_))
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        let result = GoogleSheetsProvider::new("id", "not a url", CredentialSource::default());
        assert!(matches!(result, Err(SheetsError::InvalidUrl(_))));
    }
}
