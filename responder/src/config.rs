use serde::Deserialize;
use sheets::a1::{SheetRange, is_column_letters};
use sheets::credentials::{CredentialSource, DEFAULT_CREDENTIALS_ENV};
use sheets::google::DEFAULT_API_BASE_URL;
use thiserror::Error;

/// Path of the sheet healthcheck on the public listener.
pub const HEALTHCHECK_ROUTE: &str = "/healthcheck";

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Spreadsheet id cannot be empty")]
    EmptySpreadsheetId,

    #[error("Sheet name cannot be empty")]
    EmptySheetName,

    #[error("Identifier priority list cannot be empty")]
    EmptyIdentifierPriority,

    #[error("Target header cannot be empty")]
    EmptyTargetHeader,

    #[error("Reason column must be column letters, got {0:?}")]
    InvalidReasonColumn(String),

    #[error("Route must start with '/', got {0:?}")]
    InvalidRoute(String),

    #[error("Route must be a literal path without '{{', '}}', '*' or ':', got {0:?}")]
    RoutePattern(String),

    #[error("Route {0:?} is reserved for the healthcheck")]
    ReservedRoute(String),

    #[error("Thank-you URL cannot be empty")]
    EmptyThankYouUrl,
}

/// Responder configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Public listener serving the response and healthcheck endpoints
    pub listener: Listener,
    /// Admin listener serving `/health` and `/ready`
    pub admin_listener: Listener,
    pub spreadsheet: SpreadsheetConfig,
    #[serde(default)]
    pub responses: ResponsesConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;
        self.spreadsheet.validate()?;
        self.responses.validate()?;
        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Location of the sheet holding the responses and how to reach it.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SpreadsheetConfig {
    pub spreadsheet_id: String,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    /// Column span read when looking up a row, e.g. `A:Z`
    #[serde(default = "default_read_span")]
    pub read_span: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Environment variable holding the base64-encoded service account JSON
    #[serde(default = "default_credentials_env")]
    pub credentials_env: String,
}

impl SpreadsheetConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.spreadsheet_id.trim().is_empty() {
            return Err(ValidationError::EmptySpreadsheetId);
        }
        if self.sheet_name.trim().is_empty() {
            return Err(ValidationError::EmptySheetName);
        }
        Ok(())
    }

    pub fn read_range(&self) -> SheetRange {
        SheetRange::new(&self.sheet_name, &self.read_span)
    }

    pub fn credential_source(&self) -> CredentialSource {
        CredentialSource::Env {
            var: self.credentials_env.clone(),
        }
    }
}

/// How a response is matched to a row and where it is recorded.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ResponsesConfig {
    /// Header names tried in order to find the identifier column
    #[serde(default = "default_identifier_priority")]
    pub identifier_priority: Vec<String>,
    /// Header of the column receiving SI/NO
    #[serde(default = "default_target_header")]
    pub target_header: String,
    /// Fixed column receiving the rejection reason
    #[serde(default = "default_reason_column")]
    pub reason_column: String,
    #[serde(default = "default_thank_you_url")]
    pub thank_you_url: String,
    /// Path of the response endpoint. The reason form submits back to it.
    #[serde(default = "default_route")]
    pub route: String,
}

impl Default for ResponsesConfig {
    fn default() -> Self {
        ResponsesConfig {
            identifier_priority: default_identifier_priority(),
            target_header: default_target_header(),
            reason_column: default_reason_column(),
            thank_you_url: default_thank_you_url(),
            route: default_route(),
        }
    }
}

impl ResponsesConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.identifier_priority.is_empty()
            || self.identifier_priority.iter().all(|h| h.trim().is_empty())
        {
            return Err(ValidationError::EmptyIdentifierPriority);
        }
        if self.target_header.trim().is_empty() {
            return Err(ValidationError::EmptyTargetHeader);
        }
        if !is_column_letters(&self.reason_column) {
            return Err(ValidationError::InvalidReasonColumn(
                self.reason_column.clone(),
            ));
        }
        if !self.route.starts_with('/') {
            return Err(ValidationError::InvalidRoute(self.route.clone()));
        }
        if self.route.contains(['{', '}', '*', ':']) {
            return Err(ValidationError::RoutePattern(self.route.clone()));
        }
        if self.route.trim_end_matches('/') == HEALTHCHECK_ROUTE {
            return Err(ValidationError::ReservedRoute(self.route.clone()));
        }
        if self.thank_you_url.trim().is_empty() {
            return Err(ValidationError::EmptyThankYouUrl);
        }
        Ok(())
    }
}

fn default_sheet_name() -> String {
    "Sheet1".into()
}

fn default_read_span() -> String {
    "A:Z".into()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.into()
}

fn default_credentials_env() -> String {
    DEFAULT_CREDENTIALS_ENV.into()
}

fn default_identifier_priority() -> Vec<String> {
    vec!["ID".into(), "Placa".into(), "Cedula".into()]
}

fn default_target_header() -> String {
    "Si/No".into()
}

fn default_reason_column() -> String {
    "N".into()
}

fn default_thank_you_url() -> String {
    "/gracias.html".into()
}

fn default_route() -> String {
    "/respuesta".into()
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        listener: Listener {
            host: "127.0.0.1".into(),
            port: 8080,
        },
        admin_listener: Listener {
            host: "127.0.0.1".into(),
            port: 8081,
        },
        spreadsheet: SpreadsheetConfig {
            spreadsheet_id: "test-sheet".into(),
            sheet_name: default_sheet_name(),
            read_span: default_read_span(),
            api_base_url: default_api_base_url(),
            credentials_env: default_credentials_env(),
        },
        responses: ResponsesConfig::default(),
    }
}
