use crate::a1::{CellAddress, SheetRange};
use crate::credentials::CredentialError;
use async_trait::async_trait;
use std::sync::Arc;

/// Rows of string cells as returned by the store. Row 0 is the header row.
/// Rows may be ragged: trailing empty cells are not returned.
pub type Grid = Vec<Vec<String>>;

#[derive(thiserror::Error, Debug)]
pub enum SheetsError {
    #[error("credential error: {0}")]
    Credentials(#[from] CredentialError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sheets API returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("could not obtain authorization headers: {0}")]
    Auth(String),
}

impl SheetsError {
    /// True when the failure happened before any request reached the store.
    pub fn is_configuration(&self) -> bool {
        matches!(self, SheetsError::Credentials(_) | SheetsError::InvalidUrl(_))
    }
}

/// Key-range access to a two-dimensional grid of string cells.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// Reads every row of `range`.
    async fn get_values(&self, range: &SheetRange) -> Result<Grid, SheetsError>;

    /// Overwrites a single cell with a raw (unparsed) string value.
    async fn update_value(&self, cell: &CellAddress, value: &str) -> Result<(), SheetsError>;
}

/// Produces an authorized store client.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn TabularStore>, SheetsError>;

    /// Cheap, local check used by the readiness probe.
    fn credentials_available(&self) -> bool;
}
